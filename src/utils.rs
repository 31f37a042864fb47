pub fn ts_hm() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
