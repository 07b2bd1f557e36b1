// build.rs

fn main() {
    // Build info consumed by the platform metrics (rustc version, target triple)
    vergen::EmitBuilder::builder()
        .all_build()
        .all_cargo()
        .all_rustc()
        .emit()
        .expect("Unable to generate build info");
}
