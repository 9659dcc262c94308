// C2: Address Resolver. Thin composition over the metadata accessor that
// handles the two bits of user-facing fuzziness: partial filenames ("users
// type foo.sp, file is addons/x/foo.sp") and "no file given, use the current
// one".

use crate::error::{Error, ErrorKind, Result};
use crate::metadata::DebugMetadata;
use crate::vm::UCell;

// Resolves `file` (possibly a partial name, possibly absent) against the
// image's file table, falling back to `current_file` when no file was given
// or no partial match exists.
pub fn resolve_file(meta: &dyn DebugMetadata, file: Option<&str>, current_file: &str) -> Option<String> {
    match file {
        Some(f) => meta.find_file_by_partial_name(f).or_else(|| {
            if current_file.is_empty() { None } else { Some(current_file.to_string()) }
        }),
        None => {
            if current_file.is_empty() { None } else { Some(current_file.to_string()) }
        }
    }
}

// `line` is zero-based internally; the console boundary is responsible for
// converting from the user-typed one-based line.
pub fn resolve_line(meta: &dyn DebugMetadata, file: Option<&str>, current_file: &str, line: u32) -> Result<(String, UCell)> {
    let target = resolve_file(meta, file, current_file)
        .ok_or_else(|| Error::new(ErrorKind::NotFound, "invalid filename"))?;
    let addr = meta.get_line_address(line, &target)
        .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("no code at {}:{}", target, line + 1)))?;
    Ok((target, addr))
}

pub fn resolve_function(meta: &dyn DebugMetadata, file: Option<&str>, current_file: &str, function: &str) -> Result<(String, UCell)> {
    let target = resolve_file(meta, file, current_file)
        .ok_or_else(|| Error::new(ErrorKind::NotFound, "invalid filename"))?;
    let addr = meta.get_function_address(function, &target)
        .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("unknown function {}", function)))?;
    Ok((target, addr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::mock::MockMetadata;

    #[test]
    fn resolves_partial_filename() {
        let mut m = MockMetadata::new();
        let f = m.add_file("addons/x/foo.sp");
        m.add_line(f, 11, 100);
        let (file, addr) = resolve_line(&m, Some("foo.sp"), "", 11).unwrap();
        assert_eq!(file, "addons/x/foo.sp");
        assert_eq!(addr, 100);
    }

    #[test]
    fn falls_back_to_current_file_when_omitted() {
        let mut m = MockMetadata::new();
        let f = m.add_file("main.sp");
        m.add_line(f, 5, 50);
        let (file, addr) = resolve_line(&m, None, "main.sp", 5).unwrap();
        assert_eq!(file, "main.sp");
        assert_eq!(addr, 50);
    }

    #[test]
    fn missing_line_is_not_found() {
        let mut m = MockMetadata::new();
        m.add_file("main.sp");
        let e = resolve_line(&m, None, "main.sp", 99).unwrap_err();
        assert!(e.is_not_found());
    }
}


