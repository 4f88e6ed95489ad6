// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Resolution of relative redirect paths.

use crate::Error;

/// Resolves `redirect` against the `/`-rooted path `base`.
///
/// A redirect beginning with `/` replaces the base; any other redirect
/// is appended to it. In the combined path, `.` segments are ignored,
/// `..` segments remove the preceding segment, and empty segments are
/// dropped. Climbing above the root fails with
/// [`Error::PathEscapesRoot`].
///
/// ```
/// use numlookup::query::resolve_path;
///
/// assert_eq!(resolve_path("/a/b", "../c").unwrap(), "/a/c");
/// assert_eq!(resolve_path("/a/b", "/x/./y").unwrap(), "/x/y");
/// ```
pub fn resolve_path(base: &str, redirect: &str) -> Result<String, Error> {
    let combined = if redirect.starts_with('/') {
        redirect.to_owned()
    } else {
        format!("{base}/{redirect}")
    };

    let mut stack = Vec::new();
    for segment in combined.split('/') {
        match segment {
            "" | "." => (),
            ".." => {
                if stack.pop().is_none() {
                    return Err(Error::PathEscapesRoot);
                }
            }
            _ => stack.push(segment),
        }
    }
    Ok(format!("/{}", stack.join("/")))
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
