use super::constants::*;
use super::error::RowError;
use super::sheet::RawRow;

const PLACEHOLDER: &str = "-";

/// CanonicalRow is one group of dual sampas cabled to a SOLAR board.
///
/// Slot `i` of `ds_ids` is the dual sampa on elink index `i` of the group. The first two slots are
/// always cabled; a zero in any other slot means nothing is plugged there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRow {
    pub line: u64,
    pub cru_id: u16,
    pub solar_id: u32,
    pub group_id: u32,
    pub de_id: u32,
    pub ds_ids: [u32; DUAL_SAMPAS_PER_GROUP],
}

impl CanonicalRow {
    /// The cabled dual sampas of the row as (elink index, dual sampa id)
    pub fn dual_sampas(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.ds_ids
            .iter()
            .enumerate()
            .filter(|(slot, ds_id)| *slot < MANDATORY_DUAL_SAMPAS || **ds_id != 0)
            .map(|(slot, ds_id)| (slot as u32, *ds_id))
    }
}

fn is_blank(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || cell == PLACEHOLDER
}

/// Spreadsheet padding: a row missing any of the fields every real row carries
fn is_padding(raw: &RawRow) -> bool {
    is_blank(&raw.crate_label)
        || is_blank(&raw.solar)
        || is_blank(&raw.detection_element)
        || raw.dual_sampas[..MANDATORY_DUAL_SAMPAS]
            .iter()
            .any(|ds| is_blank(ds))
}

fn malformed(raw: &RawRow, field: &'static str, value: &str, reason: &'static str) -> RowError {
    RowError::MalformedField {
        line: raw.line,
        field,
        value: value.to_string(),
        reason,
    }
}

/// Parse an id cell. Spreadsheet exports sometimes write integers as `505.0`, which is accepted.
fn parse_number(text: &str) -> Option<u32> {
    let text = text.trim();
    let integral = match text.split_once('.') {
        Some((int, frac)) if frac.bytes().all(|b| b == b'0') => int,
        Some(_) => return None,
        None => text,
    };
    if integral.is_empty() || !integral.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    integral.parse().ok()
}

fn parse_id(raw: &RawRow, field: &'static str, text: &str) -> Result<u32, RowError> {
    parse_number(text).ok_or_else(|| malformed(raw, field, text, "expected an integer"))
}

/// `C<crate>`, e.g. `C7`
fn parse_crate(raw: &RawRow) -> Result<u32, RowError> {
    let text = raw.crate_label.trim();
    let number = text
        .strip_prefix('C')
        .ok_or_else(|| malformed(raw, "crate", text, "expected C<number>"))?;
    parse_number(number).ok_or_else(|| malformed(raw, "crate", text, "expected C<number>"))
}

/// `...-S<position>-J<group>` with both numbers 1-based, returned 0-based
fn parse_solar(raw: &RawRow) -> Result<(u32, u32), RowError> {
    let text = raw.solar.trim();
    let mut parts = text.rsplit('-');
    let (Some(group_part), Some(solar_part)) = (parts.next(), parts.next()) else {
        return Err(malformed(raw, "solar", text, "expected ...-S<number>-J<number>"));
    };
    let numeral = |part: &str, prefix: char, max: u32| -> Result<u32, RowError> {
        let number = part
            .trim()
            .strip_prefix(prefix)
            .and_then(parse_number)
            .ok_or_else(|| malformed(raw, "solar", text, "expected ...-S<number>-J<number>"))?;
        match number.checked_sub(1) {
            Some(zero_based) if zero_based < max => Ok(zero_based),
            _ => Err(malformed(raw, "solar", text, "S and J must be within 1..8")),
        }
    };
    let solar_pos = numeral(solar_part, 'S', SOLARS_PER_CRATE)?;
    let group_id = numeral(group_part, 'J', GROUPS_PER_SOLAR)?;
    Ok((solar_pos, group_id))
}

/// Normalize one spreadsheet row.
///
/// Returns `Ok(None)` for padding rows, which carry no cabling.
pub fn normalize(raw: &RawRow) -> Result<Option<CanonicalRow>, RowError> {
    if is_padding(raw) {
        return Ok(None);
    }

    let crate_id = parse_crate(raw)?;
    let (solar_pos, group_id) = parse_solar(raw)?;
    let solar_id = crate_id
        .checked_mul(SOLARS_PER_CRATE)
        .and_then(|id| id.checked_add(solar_pos))
        .ok_or_else(|| malformed(raw, "crate", &raw.crate_label, "crate number too large"))?;
    let de_id = parse_id(raw, "detection_element", &raw.detection_element)?;
    let cru_id = u16::try_from(parse_id(raw, "cru", &raw.cru)?)
        .map_err(|_| malformed(raw, "cru", &raw.cru, "cru id must fit in 16 bits"))?;

    let mut ds_ids = [0u32; DUAL_SAMPAS_PER_GROUP];
    for (slot, cell) in raw.dual_sampas.iter().enumerate() {
        ds_ids[slot] = if slot >= MANDATORY_DUAL_SAMPAS && is_blank(cell) {
            0
        } else {
            parse_id(raw, "dual_sampa", cell)?
        };
    }

    Ok(Some(CanonicalRow {
        line: raw.line,
        cru_id,
        solar_id,
        group_id,
        de_id,
        ds_ids,
    }))
}

/// Normalize rows lazily, in source order, dropping padding rows
pub fn normalize_rows<'a, I>(rows: I) -> impl Iterator<Item = Result<CanonicalRow, RowError>> + 'a
where
    I: IntoIterator<Item = &'a RawRow>,
    I::IntoIter: 'a,
{
    rows.into_iter()
        .filter_map(|raw| normalize(raw).transpose())
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;

    fn raw(crate_label: &str, solar: &str, de: &str, ds: [&str; 5], cru: &str) -> RawRow {
        RawRow {
            line: 7,
            cru: cru.to_string(),
            crate_label: crate_label.to_string(),
            solar: solar.to_string(),
            detection_element: de.to_string(),
            dual_sampas: ds.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_minimal_row() {
        let row = normalize(&raw("C0", "X-X-S1-J1", "100", ["10", "20", "0", "0", "0"], "5"))
            .unwrap()
            .unwrap();
        assert_eq!(row.solar_id, 0);
        assert_eq!(row.group_id, 0);
        assert_eq!(row.de_id, 100);
        assert_eq!(row.cru_id, 5);
        assert_eq!(row.dual_sampas().collect::<Vec<_>>(), vec![(0, 10), (1, 20)]);
    }

    #[test]
    fn test_solar_id_from_crate_and_position() {
        let row = normalize(&raw("C7", "S-CH5R-S3-J2", "505", ["1", "2", "3", "", "5"], "0"))
            .unwrap()
            .unwrap();
        assert_eq!(row.solar_id, 7 * 8 + 2);
        assert_eq!(row.group_id, 1);
        assert_eq!(row.ds_ids, [1, 2, 3, 0, 5]);
        assert_eq!(
            row.dual_sampas().collect::<Vec<_>>(),
            vec![(0, 1), (1, 2), (2, 3), (4, 5)]
        );
    }

    #[test]
    fn test_spreadsheet_floats() {
        let row = normalize(&raw("C 3", "A-B-S8-J8", "505.0", ["1.0", "2", "", "", ""], "12.0"))
            .unwrap()
            .unwrap();
        assert_eq!(row.solar_id, 3 * 8 + 7);
        assert_eq!(row.group_id, 7);
        assert_eq!(row.de_id, 505);
        assert_eq!(row.cru_id, 12);
        assert!(normalize(&raw("C1", "A-B-S1-J1", "505.5", ["1", "2", "", "", ""], "0")).is_err());
    }

    #[test]
    fn test_padding_rows_are_dropped() {
        assert_eq!(normalize(&RawRow::default()).unwrap(), None);
        assert_eq!(
            normalize(&raw("C1", "", "100", ["1", "2", "", "", ""], "0")).unwrap(),
            None
        );
        assert_eq!(
            normalize(&raw("C1", "A-B-S1-J1", "100", ["1", "-", "", "", ""], "0")).unwrap(),
            None
        );
    }

    #[test]
    fn test_malformed_crate() {
        let err = normalize(&raw("7", "A-B-S1-J1", "100", ["1", "2", "", "", ""], "0")).unwrap_err();
        assert!(matches!(
            err,
            RowError::MalformedField {
                line: 7,
                field: "crate",
                ..
            }
        ));
        assert!(normalize(&raw("Cx", "A-B-S1-J1", "100", ["1", "2", "", "", ""], "0")).is_err());
    }

    #[test]
    fn test_malformed_solar() {
        for solar in ["A-B-S0-J1", "A-B-S9-J1", "A-B-S1-J0", "A-B-S1-J9", "S1", "A-B-X1-J1", "A-B-S1-K1"] {
            let err = normalize(&raw("C1", solar, "100", ["1", "2", "", "", ""], "0")).unwrap_err();
            assert!(
                matches!(err, RowError::MalformedField { field: "solar", .. }),
                "{solar} should be rejected"
            );
        }
    }

    #[test]
    fn test_malformed_numbers() {
        assert!(normalize(&raw("C1", "A-B-S1-J1", "DE100", ["1", "2", "", "", ""], "0")).is_err());
        assert!(normalize(&raw("C1", "A-B-S1-J1", "100", ["1", "2", "x", "", ""], "0")).is_err());
        assert!(normalize(&raw("C1", "A-B-S1-J1", "100", ["1", "2", "", "", ""], "")).is_err());
        assert!(normalize(&raw("C1", "A-B-S1-J1", "100", ["1", "2", "", "", ""], "70000")).is_err());
    }

    #[test]
    fn test_normalize_rows_keeps_order() {
        let rows = vec![
            raw("C0", "A-B-S1-J1", "100", ["1", "2", "", "", ""], "0"),
            RawRow::default(),
            raw("C0", "A-B-S2-J1", "101", ["3", "4", "", "", ""], "0"),
        ];
        let normalized: Vec<_> = normalize_rows(&rows).collect::<Result<_, _>>().unwrap();
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].de_id, 100);
        assert_eq!(normalized[1].de_id, 101);
    }
}
