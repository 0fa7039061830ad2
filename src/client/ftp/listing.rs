/// Reduce raw `LIST` output to entry names.
///
/// Only the last whitespace-delimited token of each non-blank line is kept, so
/// names that contain spaces come back truncated to their final word.
pub fn parse_names(listing: &str) -> Vec<String> {
    listing
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split_whitespace().last())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_listing() {
        let listing = "-rw-r--r-- 1 user group 12345 Nov 15 10:30 file1.txt\r\n\
                       drwxr-xr-x 2 user group 4096 Nov 15 10:30 sub dir/\r\n";
        assert_eq!(parse_names(listing), vec!["file1.txt", "dir/"]);
    }

    #[test]
    fn test_blank_lines_dropped() {
        let listing = "\r\n   \r\na.txt\n\n  b.txt  \n";
        assert_eq!(parse_names(listing), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_empty_listing() {
        assert!(parse_names("").is_empty());
        assert!(parse_names("\r\n\r\n").is_empty());
    }

    #[test]
    fn test_order_preserved() {
        let listing = "z\ny\nx\n";
        assert_eq!(parse_names(listing), vec!["z", "y", "x"]);
    }
}
