fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Both halves are generated: the driver serves them, tests dial them.
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/cosi.proto"], &["proto"])?;

    Ok(())
}
