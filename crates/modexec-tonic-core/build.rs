/// Builds the gRPC client and server code for `modexec.proto` using
/// `tonic-prost-build`.
///
/// The generated bindings and an encoded file descriptor set (used for server
/// reflection) are written to the crate's `OUT_DIR`.
///
/// # Files and Paths
///
/// - Proto file: `proto/modexec.proto`
/// - Includes: `proto/`
///
/// `google.protobuf.Empty` is mapped to `()` by prost, so `IsAvailable` takes
/// and returns the unit type.
///
/// # Panics
///
/// Panics if code generation fails, which aborts the build with protoc's
/// diagnostics.
use std::env;
use std::path::PathBuf;
fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("modexec_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/modexec.proto"], &["proto"])
        .unwrap();
}
