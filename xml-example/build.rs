use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::Path;
use xml_bindgen::{Envelope, ProtocolDefaults};

const MODEL: &str = "model/showcase.xml";

fn generate(out_dir: &Path, file: &str, defaults: &ProtocolDefaults) -> Result<()> {
    let model = fs::File::open(MODEL).with_context(|| format!("open {MODEL}"))?;
    let src = xml_bindgen::gen_bindings(model, defaults)
        .with_context(|| format!("generate {file} from {MODEL}"))?;
    fs::write(out_dir.join(file), format!("{}{src}", xml_bindgen::HEADER))
        .with_context(|| format!("write {file}"))?;
    Ok(())
}

fn main() -> Result<()> {
    let out_dir = env::var_os("OUT_DIR").context("OUT_DIR is not set")?;
    let out_dir = Path::new(&out_dir);

    let rest = ProtocolDefaults {
        error_wrapping: false,
        ..ProtocolDefaults::default()
    };
    generate(out_dir, "rest.rs", &rest)?;

    let query = ProtocolDefaults {
        envelope: Envelope::Wrapped,
        ..ProtocolDefaults::default()
    };
    generate(out_dir, "query.rs", &query)?;

    println!("cargo:rerun-if-changed={MODEL}");
    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
