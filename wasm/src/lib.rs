// Copyright 2024 Viktor Reusch
//
// This file is part of timeline_gpx.
//
// timeline_gpx is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// timeline_gpx is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.
//
// You should have received a copy of the GNU Affero General Public License
// along with timeline_gpx. If not, see <https://www.gnu.org/licenses/>.

//! This is a WASM wrapper for `timeline_gpx`.

use timeline_gpx::Kind;
use wasm_bindgen::{prelude::wasm_bindgen, JsError};

/// This wraps `timeline_gpx::convert` for interfacing with JS.
///
/// `kind` selects the output and is either `"routes"` or `"tracks"`.
#[wasm_bindgen]
pub fn convert(source: &[u8], kind: &str) -> Result<Box<[u8]>, JsError> {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    let kind = match kind {
        "routes" => Kind::Route,
        "tracks" => Kind::Track,
        other => return Err(JsError::new(&format!("unknown output kind: {other}"))),
    };

    let mut sink = vec![];
    timeline_gpx::convert(source, kind, &mut sink)?;
    Ok(sink.into_boxed_slice())
}
