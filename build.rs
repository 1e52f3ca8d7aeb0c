// build.rs

fn main() {
    // Generate build info (VERGEN_GIT_SHA, VERGEN_BUILD_TIMESTAMP, ...)
    if let Err(e) = vergen::EmitBuilder::builder()
        .all_build()
        .all_git()
        .emit()
    {
        println!("cargo:warning=Unable to generate build info: {e}");
    }
}
