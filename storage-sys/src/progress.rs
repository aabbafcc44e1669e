// SPDX-License-Identifier: GPL-3.0-only

pub fn compute_progress_percent(bytes_processed: u64, total_bytes: u64) -> f64 {
    if total_bytes == 0 {
        return 100.0;
    }

    let ratio = bytes_processed as f64 / total_bytes as f64;
    (ratio * 100.0).clamp(0.0, 100.0)
}
