//! Byte-level helpers for the CoNLL-U reader

use atoi::FromRadix10Checked;
use bstr::ByteSlice;
use memchr::memchr;

/// Number of tab-separated columns in a CoNLL-U word line
pub const COLUMNS: usize = 10;

// Divide a bytestring into two at delim
#[inline]
pub fn bs_split_once(bytes: &[u8], delim: u8) -> Option<(&[u8], &[u8])> {
    let pos = memchr(delim, bytes)?;
    Some((&bytes[..pos], &bytes[pos + 1..]))
}

/// Split a word line into its ten columns
///
/// Returns the number of columns found if it is not exactly ten.
#[inline]
pub fn split_columns(line: &[u8]) -> Result<[&[u8]; COLUMNS], usize> {
    let mut columns: [&[u8]; COLUMNS] = [&[]; COLUMNS];
    let mut rest = line;
    let mut count = 0;
    loop {
        let (column, tail) = match memchr(b'\t', rest) {
            Some(pos) => (&rest[..pos], Some(&rest[pos + 1..])),
            None => (rest, None),
        };
        if count < COLUMNS {
            columns[count] = column;
        }
        count += 1;
        match tail {
            Some(tail) => rest = tail,
            None => break,
        }
    }
    if count == COLUMNS {
        Ok(columns)
    } else {
        Err(count)
    }
}

/// Parse an unsigned decimal integer, rejecting empty input and trailing bytes
#[inline]
pub fn bs_atoi(bytes: &[u8]) -> Option<usize> {
    match usize::from_radix_10_checked(bytes) {
        (Some(n), used) if used == bytes.len() && used > 0 => Some(n),
        _ => None,
    }
}

/// Strip the line terminator (`\n` or `\r\n`)
#[inline]
pub fn trim_eol(line: &[u8]) -> &[u8] {
    line.trim_end_with(|c| c == '\n' || c == '\r')
}

/// True for lines that contain only whitespace
#[inline]
pub fn is_blank(line: &[u8]) -> bool {
    line.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===== bs_split_once Tests =====

    #[test]
    fn test_split_once() {
        assert_eq!(
            bs_split_once(b"key=value", b'='),
            Some((b"key" as &[u8], b"value" as &[u8]))
        );

        assert_eq!(bs_split_once(b"nodelimiter", b'='), None);
        assert_eq!(bs_split_once(b"", b'='), None);

        assert_eq!(
            bs_split_once(b"=value", b'='),
            Some((b"" as &[u8], b"value" as &[u8]))
        );
        assert_eq!(
            bs_split_once(b"key=", b'='),
            Some((b"key" as &[u8], b"" as &[u8]))
        );

        // splits at the first delimiter
        assert_eq!(
            bs_split_once(b"5:nmod:poss", b':'),
            Some((b"5" as &[u8], b"nmod:poss" as &[u8]))
        );
    }

    // ===== split_columns Tests =====

    #[test]
    fn test_split_columns() {
        let line = b"1\tThe\tthe\tDET\tDT\t_\t2\tdet\t_\tSpaceAfter=No";
        let columns = split_columns(line).unwrap();
        assert_eq!(columns[0], b"1");
        assert_eq!(columns[1], b"The");
        assert_eq!(columns[6], b"2");
        assert_eq!(columns[9], b"SpaceAfter=No");
    }

    #[test]
    fn test_split_columns_keeps_spaces() {
        let line = b"1\tNew York\tNew York\tPROPN\t_\t_\t0\troot\t_\t_";
        let columns = split_columns(line).unwrap();
        assert_eq!(columns[1], b"New York");
    }

    #[test]
    fn test_split_columns_wrong_count() {
        assert_eq!(split_columns(b"1\tThe\tthe").unwrap_err(), 3);
        assert_eq!(split_columns(b"").unwrap_err(), 1);
        assert_eq!(split_columns(b"1\t2\t3\t4\t5\t6\t7\t8\t9\t10\t11").unwrap_err(), 11);
        // a trailing tab makes an eleventh, empty column
        assert_eq!(split_columns(b"1\t2\t3\t4\t5\t6\t7\t8\t9\t10\t").unwrap_err(), 11);
    }

    // ===== bs_atoi Tests =====

    #[test]
    fn test_atoi_valid() {
        assert_eq!(bs_atoi(b"0"), Some(0));
        assert_eq!(bs_atoi(b"1"), Some(1));
        assert_eq!(bs_atoi(b"42"), Some(42));
        assert_eq!(bs_atoi(b"123456"), Some(123456));
        assert_eq!(bs_atoi(b"007"), Some(7));
        assert_eq!(bs_atoi(b"18446744073709551615"), Some(usize::MAX));
    }

    #[test]
    fn test_atoi_invalid() {
        assert_eq!(bs_atoi(b""), None);
        assert_eq!(bs_atoi(b"abc"), None);
        assert_eq!(bs_atoi(b"12a"), None);
        assert_eq!(bs_atoi(b"a12"), None);
        assert_eq!(bs_atoi(b"1.23"), None);
        assert_eq!(bs_atoi(b"1-2"), None);
        assert_eq!(bs_atoi(b"-42"), None);
        assert_eq!(bs_atoi(b"+42"), None);
        assert_eq!(bs_atoi(b" 42"), None);
        assert_eq!(bs_atoi(b"42 "), None);
        assert_eq!(bs_atoi(b"_"), None);

        // overflow
        assert_eq!(bs_atoi(b"18446744073709551616"), None);
        assert_eq!(bs_atoi(b"99999999999999999999"), None);
    }

    // ===== line helpers =====

    #[test]
    fn test_trim_eol() {
        assert_eq!(trim_eol(b"1\tx\n"), b"1\tx");
        assert_eq!(trim_eol(b"1\tx\r\n"), b"1\tx");
        assert_eq!(trim_eol(b"# text = a b "), b"# text = a b ");
        assert!(is_blank(b" \t\r\n"));
        assert!(is_blank(b""));
        assert!(!is_blank(b"# x"));
    }
}
