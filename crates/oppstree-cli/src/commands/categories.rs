//! `ost categories`: list the configured source categories.

use comfy_table::{Table, presets::UTF8_FULL};

use oppstree_types::CategoryRegistry;

/// Render the category table.
pub fn categories_table(registry: &CategoryRegistry) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["KEY", "LABEL", "WEIGHT", "DESCRIPTION"]);
    for cat in registry.iter() {
        table.add_row(vec![
            cat.key.clone(),
            cat.label.clone(),
            format!("{}x", cat.weight),
            cat.description.clone(),
        ]);
    }
    table
}

pub fn categories_list(registry: &CategoryRegistry) {
    println!("{}", categories_table(registry));
    println!("  {} categories", registry.len());
}
