//! Colored status markers for the operator.

use colored::Colorize;

pub fn success(msg: impl AsRef<str>) {
    println!("{} {}", "[OK]".green().bold(), msg.as_ref());
}

pub fn info(msg: impl AsRef<str>) {
    println!("{} {}", "[INFO]".cyan().bold(), msg.as_ref());
}

pub fn warn(msg: impl AsRef<str>) {
    println!("{} {}", "[WARN]".yellow().bold(), msg.as_ref());
}

pub fn error(msg: impl AsRef<str>) {
    eprintln!("{} {}", "[ERROR]".red().bold(), msg.as_ref());
}
