// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

fn main() {
    // the local store schema is embedded by `sqlx::migrate!`, rebuild when it changes
    println!("cargo:rerun-if-changed=src/localdb/migrations");
}
