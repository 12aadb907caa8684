//! List command implementation

use crate::target::TARGETS;

/// List supported targets
pub fn list_targets() {
    println!("Supported targets:");
    println!();

    for t in TARGETS {
        let aliases = if t.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", t.aliases.join(", "))
        };
        println!("  {:6} - {}{}", t.name, t.description, aliases);
    }

    println!();
    println!("Simulator options (target:key=value,...):");
    println!("  busy=<n>              FSTAT polls per command");
    println!("  flexram=<ram|eeprom>  initial FlexRAM function");
    println!("  fprot=<hex>           protection word, 0 bits are protected regions");
    println!("  secure=<yes|no>       report the part as secured");
}
