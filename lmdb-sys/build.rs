// Prefer a system-installed liblmdb (e.g. `apt install liblmdb-dev`, `brew
// install lmdb`) located via pkg-config. The upstream mdb.c/midl.c sources
// are not vendored in this crate; see DESIGN.md for why.
fn main() {
    if pkg_config::Config::new().probe("lmdb").is_err() {
        println!("cargo:warning=liblmdb not found via pkg-config; set LMDB_LIB_DIR or install liblmdb-dev");
        if let Ok(lib_dir) = std::env::var("LMDB_LIB_DIR") {
            println!("cargo:rustc-link-search=native={lib_dir}");
        }
        println!("cargo:rustc-link-lib=dylib=lmdb");
    }
}
