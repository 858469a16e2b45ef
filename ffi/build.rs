use std::env;
use std::path::PathBuf;

const HEADER: &str = "users_ffi.h";

/// Set to a directory to also copy the generated header there.
const HEADER_DIR_ENV: &str = "USERS_FFI_HEADER_DIR";

fn main() {
    let crate_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string()));
    let Ok(out_dir) = env::var("OUT_DIR") else {
        println!("cargo:warning=OUT_DIR not set; skipping header generation");
        return;
    };

    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=src/types.rs");
    println!("cargo:rerun-if-env-changed={HEADER_DIR_ENV}");

    let bindings = match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("USERS_FFI_H")
        .generate()
    {
        Ok(bindings) => bindings,
        // A broken header should not break the library build.
        Err(e) => {
            println!("cargo:warning=cbindgen failed: {e}");
            return;
        }
    };

    bindings.write_to_file(PathBuf::from(out_dir).join(HEADER));

    if let Ok(dir) = env::var(HEADER_DIR_ENV) {
        let dir = PathBuf::from(dir);
        if let Err(e) = std::fs::create_dir_all(&dir) {
            println!("cargo:warning=cannot create {}: {e}", dir.display());
            return;
        }
        bindings.write_to_file(dir.join(HEADER));
    }
}
