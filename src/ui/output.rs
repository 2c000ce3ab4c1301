use crate::ui::{Icons, theme};
use owo_colors::OwoColorize;

/// Title line followed by a dimmed subtitle
pub fn banner(title: &str, subtitle: &str) {
    println!();
    println!("{} {}", Icons::PACKAGE, title);
    println!("   {}", subtitle.style(theme().dim.clone()));
    println!();
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

/// Table name highlighted for inline use
pub fn table_name(name: &str) -> String {
    name.style(theme().table.clone()).to_string()
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim.clone()), value);
}
