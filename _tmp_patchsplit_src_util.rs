// Small text helpers shared by the console and the symbol inspector's
// display formatting. Grounded on `skippath`/`strstrip`/`skipwhitespace` in
// the original SourcePawn debugger.

pub const CELL_SIZE: u32 = 4;

// Strip directory components from both POSIX and DOS/Windows-style paths,
// for display only - never used to resolve a file on disk.
pub fn display_basename(path: &str) -> &str {
    let posix = path.rfind('/').map(|i| i + 1);
    let dos = path.rfind('\\').map(|i| i + 1);
    match (posix, dos) {
        (Some(a), Some(b)) => &path[a.max(b)..],
        (Some(a), None) => &path[a..],
        (None, Some(b)) => &path[b..],
        (None, None) => path,
    }
}

pub fn skip_whitespace(s: &str) -> &str {
    s.trim_start_matches([' ', '\t'])
}

pub fn strip(s: &str) -> &str {
    s.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_posix() {
        assert_eq!(display_basename("addons/x/foo.sp"), "foo.sp");
    }

    #[test]
    fn basename_dos() {
        assert_eq!(display_basename("C:\\addons\\x\\foo.sp"), "foo.sp");
    }

    #[test]
    fn basename_plain() {
        assert_eq!(display_basename("foo.sp"), "foo.sp");
    }
}


