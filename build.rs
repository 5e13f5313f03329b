use shadow_rs::ShadowBuilder;

fn main() {
    // Build metadata backs `timeclock-rs --version`
    ShadowBuilder::builder()
        .build()
        .expect("Failed to generate build metadata");
}
