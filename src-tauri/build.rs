fn main() {
    // The Tauri context (tauri.conf.json, capabilities) is only needed for the
    // desktop shell. Headless builds of the library skip code generation.
    #[cfg(feature = "desktop")]
    tauri_build::build();
}
