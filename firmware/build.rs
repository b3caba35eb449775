fn main() {
    // Settings from cfg.toml are baked in by toml-cfg.
    println!("cargo:rerun-if-changed=cfg.toml");
}
