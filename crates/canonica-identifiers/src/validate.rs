//! Checksum validation for identifier namespaces that define one

/// ORCID check digit: ISO 7064 mod 11-2 over the 15 leading digits, with
/// `X` standing for 10.
pub fn is_valid_orcid(orcid: &str) -> bool {
    let digits: Vec<char> = orcid.chars().filter(|c| *c != '-').collect();
    if digits.len() != 16 {
        return false;
    }
    let mut total: u32 = 0;
    for c in &digits[..15] {
        let d = match c.to_digit(10) {
            Some(d) => d,
            None => return false,
        };
        total = (total + d) * 2;
    }
    let remainder = total % 11;
    let check = (12 - remainder) % 11;
    let last = digits[15];
    match last {
        'X' | 'x' => check == 10,
        c => c.to_digit(10) == Some(check),
    }
}

/// ISSN check digit: weighted sum mod 11 over the 7 leading digits.
pub fn is_valid_issn(issn: &str) -> bool {
    let digits: Vec<char> = issn.chars().filter(|c| *c != '-').collect();
    if digits.len() != 8 {
        return false;
    }
    let mut total: u32 = 0;
    for (i, c) in digits[..7].iter().enumerate() {
        let d = match c.to_digit(10) {
            Some(d) => d,
            None => return false,
        };
        total += d * (8 - i as u32);
    }
    let check = (11 - total % 11) % 11;
    match digits[7] {
        'X' | 'x' => check == 10,
        c => c.to_digit(10) == Some(check),
    }
}
