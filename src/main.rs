#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

fn main() {
    tally_expert_desktop::app_runtime::run();
}
