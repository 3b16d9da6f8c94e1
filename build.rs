fn main() {
    println!("cargo:rerun-if-env-changed=OTA_MQTT_HOST");
    println!("cargo:rerun-if-env-changed=OTA_MQTT_PORT");
    println!("cargo:rerun-if-env-changed=OTA_MQTT_USER");
    println!("cargo:rerun-if-env-changed=OTA_MQTT_PASS");
    println!("cargo:rerun-if-env-changed=OTA_MQTT_CLIENT_ID");
    println!("cargo:rerun-if-env-changed=OTA_MQTT_TOPIC_IN");
    println!("cargo:rerun-if-env-changed=OTA_MQTT_TOPIC_OUT");
    println!("cargo:rerun-if-env-changed=OTA_FIRMWARE_VERSION");
    println!("cargo:rerun-if-env-changed=OTA_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=OTA_WIFI_PASS");

    // Host builds (tests, fuzzing) have no ESP-IDF toolchain to describe.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
