fn main() {
    // Build scripts run on the host; only hand over to the ESP-IDF build
    // system when the target is the Xtensa ESP32.
    if let Ok(target) = std::env::var("TARGET") {
        if target.contains("xtensa") {
            embuild::espidf::sysenv::output();
        }
    }
}
