//! ---
//! cp_section: "01-core-functionality"
//! cp_subsection: "module"
//! cp_type: "source"
//! cp_scope: "code"
//! cp_description: "Build metadata emission for shared runtime primitives."
//! cp_version: "v0.0.0-prealpha"
//! cp_owner: "tbd"
//! ---
use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // No git instructions here: release tarballs must build outside a checkout,
    // and VersionInfo degrades the missing fields to UNKNOWN.
    EmitBuilder::builder().all_build().all_cargo().emit()?;

    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
