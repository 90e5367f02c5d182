use std::{collections::BTreeMap, env, error::Error, fmt::Write, fs, path::Path};

// Settings keep the string values they were written with; the firmware
// parses them into typed config at startup so a malformed value fails
// there, where it can be reported, not silently at build time.
fn main() -> Result<(), Box<dyn Error>> {
    // Tell Cargo to rerun if toml changes
    println!("cargo:rerun-if-changed=cfg.toml");

    // Read and parse
    let toml_str = fs::read_to_string("cfg.toml")?;
    let raw: BTreeMap<String, String> = toml::from_str(&toml_str)?;

    // Generate Rust code
    let out_dir = env::var("OUT_DIR")?;
    let dest_path = Path::new(&out_dir).join("settings.rs");

    let mut entries = String::new();
    for (key, value) in &raw {
        writeln!(entries, "        ({key:?}, {value:?}),")?;
    }

    let code = format!(
        "pub static SETTINGS: Settings = Settings {{\n    entries: &[\n{entries}    ],\n}};\n"
    );

    fs::write(dest_path, code)?;
    Ok(())
}
