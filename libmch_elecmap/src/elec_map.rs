// The electronic map proper. General concept:
// (solar, group, elink index) <-> (detection element, dual sampa)
// plus the bookkeeping the readout needs around it:
// cru -> {solar}, detection element -> cru, and the number of SOLAR boards in use.
//
// Everything is keyed on the packed codes (see ds_id) and kept in ordered maps, so that
// anything generated from the tables comes out in the same order on every run.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use fxhash::FxHashSet;

use super::ds_id::{
    decode_address, decode_channel, encode_address, encode_channel, AddressCode, ChannelCode,
    DsDetId, DsElecId,
};
use super::error::{BuildError, CodecError};
use super::row::CanonicalRow;

/// Which detection elements go into the map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeSelection {
    #[default]
    All,
    /// Only these detection elements. An empty set selects nothing.
    Only(BTreeSet<u32>),
}

impl DeSelection {
    pub fn contains(&self, de_id: u32) -> bool {
        match self {
            Self::All => true,
            Self::Only(de_ids) => de_ids.contains(&de_id),
        }
    }
}

impl From<Option<Vec<u32>>> for DeSelection {
    fn from(de_ids: Option<Vec<u32>>) -> Self {
        match de_ids {
            Some(ids) => Self::Only(ids.into_iter().collect()),
            None => Self::All,
        }
    }
}

/// One dual sampa, from both sides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wiring {
    pub elec: DsElecId,
    pub det: DsDetId,
}

impl fmt::Display for Wiring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.elec, self.det)
    }
}

/// A detection element found behind two different CRUs. The first CRU seen is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataQualityWarning {
    pub line: u64,
    pub de_id: u16,
    pub kept_cru: u16,
    pub ignored_cru: u16,
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DE {} is read by CRU {} but line {} assigns it to CRU {}; keeping CRU {}",
            self.de_id, self.kept_cru, self.line, self.ignored_cru, self.kept_cru
        )
    }
}

/// ElecMapTables holds the lookup tables of one electronic map.
///
/// The tables are immutable once built, either from cabling rows with [`build`] or from a
/// previously emitted artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElecMapTables {
    elec_to_det: BTreeMap<AddressCode, ChannelCode>,
    det_to_elec: BTreeMap<ChannelCode, AddressCode>,
    cru_to_solars: BTreeMap<u16, BTreeSet<u16>>,
    de_id_to_cru: BTreeMap<u16, u16>,
    solar_count: usize,
    warnings: Vec<DataQualityWarning>,
}

impl ElecMapTables {
    /// Reassemble tables from their emitted form, checking that the wiring is still one-to-one
    pub fn from_parts(
        elec_to_det: impl IntoIterator<Item = (AddressCode, ChannelCode)>,
        cru_to_solars: BTreeMap<u16, BTreeSet<u16>>,
        de_id_to_cru: BTreeMap<u16, u16>,
        solar_count: usize,
    ) -> Result<Self, BuildError> {
        let mut tables = Self {
            cru_to_solars,
            de_id_to_cru,
            solar_count,
            ..Default::default()
        };
        for (address, channel) in elec_to_det {
            tables.add_wiring(address, channel)?;
        }
        Ok(tables)
    }

    /// Insert one dual sampa. Inserting the same pair twice is fine, reusing either side is not.
    fn add_wiring(&mut self, address: AddressCode, channel: ChannelCode) -> Result<(), BuildError> {
        let conflict = |other_address: AddressCode, other_channel: ChannelCode| {
            BuildError::DuplicateAddress {
                first: Wiring {
                    elec: decode_address(other_address),
                    det: decode_channel(other_channel),
                },
                second: Wiring {
                    elec: decode_address(address),
                    det: decode_channel(channel),
                },
            }
        };
        if let Some(existing) = self.elec_to_det.get(&address) {
            if *existing != channel {
                return Err(conflict(address, *existing));
            }
            return Ok(());
        }
        if let Some(existing) = self.det_to_elec.get(&channel) {
            return Err(conflict(*existing, channel));
        }
        self.elec_to_det.insert(address, channel);
        self.det_to_elec.insert(channel, address);
        Ok(())
    }

    /// Which dual sampa sits at this electronics address
    pub fn det_id(&self, elec: &DsElecId) -> Option<DsDetId> {
        self.elec_to_det.get(&elec.code()).map(|code| decode_channel(*code))
    }

    /// Which electronics address reads this dual sampa
    pub fn elec_id(&self, det: &DsDetId) -> Option<DsElecId> {
        self.det_to_elec.get(&det.code()).map(|code| decode_address(*code))
    }

    /// The SOLAR boards read by a CRU
    pub fn solar_ids(&self, cru_id: u16) -> Option<&BTreeSet<u16>> {
        self.cru_to_solars.get(&cru_id)
    }

    /// The CRU reading a detection element
    pub fn cru_id(&self, de_id: u16) -> Option<u16> {
        self.de_id_to_cru.get(&de_id).copied()
    }

    /// The CRU reading a SOLAR board
    pub fn cru_of_solar(&self, solar_id: u16) -> Option<u16> {
        self.cru_to_solars
            .iter()
            .find(|(_, solars)| solars.contains(&solar_id))
            .map(|(cru, _)| *cru)
    }

    pub fn cru_ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.cru_to_solars.keys().copied()
    }

    /// Number of distinct SOLAR boards in the map
    pub fn solar_count(&self) -> usize {
        self.solar_count
    }

    pub fn elec_to_det(&self) -> &BTreeMap<AddressCode, ChannelCode> {
        &self.elec_to_det
    }

    pub fn det_to_elec(&self) -> &BTreeMap<ChannelCode, AddressCode> {
        &self.det_to_elec
    }

    pub fn cru_to_solars(&self) -> &BTreeMap<u16, BTreeSet<u16>> {
        &self.cru_to_solars
    }

    pub fn de_id_to_cru(&self) -> &BTreeMap<u16, u16> {
        &self.de_id_to_cru
    }

    pub fn warnings(&self) -> &[DataQualityWarning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.elec_to_det.is_empty()
            && self.cru_to_solars.is_empty()
            && self.de_id_to_cru.is_empty()
            && self.solar_count == 0
    }
}

/// Build the electronic map of the selected detection elements.
///
/// Fails on the first row that cannot be encoded, or that cables a dual sampa or an electronics
/// address already used by a different pairing. A detection element read by two CRUs is only
/// warned about.
pub fn build<'a, I>(rows: I, selection: &DeSelection) -> Result<ElecMapTables, BuildError>
where
    I: IntoIterator<Item = &'a CanonicalRow>,
{
    let mut tables = ElecMapTables::default();
    let mut solars = FxHashSet::<u16>::default();

    for row in rows.into_iter().filter(|row| selection.contains(row.de_id)) {
        let codec_error = |source: CodecError| BuildError::Codec {
            line: row.line,
            source,
        };
        let solar_id = DsElecId::new(row.solar_id, row.group_id, 0)
            .map_err(codec_error)?
            .solar_id();
        let de_id = DsDetId::new(row.de_id, 0).map_err(codec_error)?.de_id();
        for (elink_index, ds_id) in row.dual_sampas() {
            let address =
                encode_address(row.solar_id, row.group_id, elink_index).map_err(codec_error)?;
            let channel = encode_channel(row.de_id, ds_id).map_err(codec_error)?;
            tables.add_wiring(address, channel)?;
        }

        spdlog::debug!(
            "Line {}: CRU {} SOLAR {} group {} DE {} dual sampas {:?}",
            row.line,
            row.cru_id,
            solar_id,
            row.group_id,
            de_id,
            row.ds_ids
        );

        tables
            .cru_to_solars
            .entry(row.cru_id)
            .or_default()
            .insert(solar_id);
        solars.insert(solar_id);

        match tables.de_id_to_cru.get(&de_id) {
            Some(kept_cru) if *kept_cru != row.cru_id => {
                let warning = DataQualityWarning {
                    line: row.line,
                    de_id,
                    kept_cru: *kept_cru,
                    ignored_cru: row.cru_id,
                };
                spdlog::warn!("{warning}");
                tables.warnings.push(warning);
            }
            Some(_) => (),
            None => {
                tables.de_id_to_cru.insert(de_id, row.cru_id);
            }
        }
    }

    tables.solar_count = solars.len();
    spdlog::info!(
        "Built electronic map: {} dual sampas, {} CRUs, {} detection elements, {} SOLARs",
        tables.elec_to_det.len(),
        tables.cru_to_solars.len(),
        tables.de_id_to_cru.len(),
        tables.solar_count
    );
    Ok(tables)
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;

    fn row(cru_id: u16, solar_id: u32, group_id: u32, de_id: u32, ds_ids: [u32; 5]) -> CanonicalRow {
        CanonicalRow {
            line: 1,
            cru_id,
            solar_id,
            group_id,
            de_id,
            ds_ids,
        }
    }

    #[test]
    fn test_single_row_tables() {
        let rows = vec![row(5, 0, 0, 100, [10, 20, 0, 0, 0])];
        let tables = build(&rows, &DeSelection::All).unwrap();
        assert!(tables.solar_ids(5).unwrap().contains(&0));
        assert_eq!(tables.cru_id(100), Some(5));
        assert_eq!(
            tables.elec_to_det()[&encode_address(0, 0, 0).unwrap()],
            encode_channel(100, 10).unwrap()
        );
        assert_eq!(
            tables.elec_to_det()[&encode_address(0, 0, 1).unwrap()],
            encode_channel(100, 20).unwrap()
        );
        assert_eq!(tables.elec_to_det().len(), 2);
        assert_eq!(tables.solar_count(), 1);
    }

    #[test]
    fn test_lookups() {
        let rows = vec![
            row(5, 58, 1, 505, [1, 2, 3, 0, 0]),
            row(6, 144, 7, 501, [1, 2, 0, 0, 9]),
        ];
        let tables = build(&rows, &DeSelection::All).unwrap();
        let elec = DsElecId::new(144, 7, 4).unwrap();
        let det = DsDetId::new(501, 9).unwrap();
        assert_eq!(tables.det_id(&elec), Some(det));
        assert_eq!(tables.elec_id(&det), Some(elec));
        assert_eq!(tables.det_id(&DsElecId::new(144, 7, 3).unwrap()), None);
        assert_eq!(tables.cru_of_solar(58), Some(5));
        assert_eq!(tables.cru_of_solar(59), None);
        assert_eq!(tables.cru_ids().collect::<Vec<_>>(), vec![5, 6]);
    }

    #[test]
    fn test_same_channel_two_addresses() {
        let rows = vec![
            row(0, 1, 0, 100, [10, 20, 0, 0, 0]),
            row(0, 2, 0, 100, [10, 30, 0, 0, 0]),
        ];
        let err = build(&rows, &DeSelection::All).unwrap_err();
        assert!(matches!(err, BuildError::DuplicateAddress { .. }));
    }

    #[test]
    fn test_same_address_two_channels() {
        let rows = vec![
            row(0, 1, 0, 100, [10, 20, 0, 0, 0]),
            row(0, 1, 0, 101, [11, 21, 0, 0, 0]),
        ];
        match build(&rows, &DeSelection::All) {
            Err(BuildError::DuplicateAddress { first, second }) => {
                assert_eq!(first.elec, second.elec);
                assert_eq!(first.det, DsDetId::new(100, 10).unwrap());
                assert_eq!(second.det, DsDetId::new(101, 11).unwrap());
            }
            other => panic!("expected a duplicate address, got {other:?}"),
        }
    }

    #[test]
    fn test_reinsertion_is_idempotent() {
        let single = vec![row(5, 0, 0, 100, [10, 20, 30, 0, 0])];
        let twice = vec![single[0].clone(), single[0].clone()];
        let once = build(&single, &DeSelection::All).unwrap();
        let again = build(&twice, &DeSelection::All).unwrap();
        assert_eq!(once.elec_to_det().len(), again.elec_to_det().len());
        assert_eq!(once, again);
    }

    #[test]
    fn test_range_errors() {
        let rows = vec![row(0, 1024, 0, 100, [10, 20, 0, 0, 0])];
        assert!(matches!(
            build(&rows, &DeSelection::All),
            Err(BuildError::Codec { .. })
        ));
        let rows = vec![row(0, 1, 0, 70000, [10, 20, 0, 0, 0])];
        assert!(matches!(
            build(&rows, &DeSelection::All),
            Err(BuildError::Codec { .. })
        ));
        let rows = vec![row(0, 1, 8, 100, [10, 20, 0, 0, 0])];
        assert!(matches!(
            build(&rows, &DeSelection::All),
            Err(BuildError::Codec {
                line: 1,
                source: CodecError::OutOfRange {
                    field: "group_id",
                    ..
                }
            })
        ));
    }

    #[test]
    fn test_de_cru_conflict_first_wins() {
        let rows = vec![
            row(3, 1, 0, 100, [10, 20, 0, 0, 0]),
            row(4, 2, 0, 100, [11, 21, 0, 0, 0]),
        ];
        let tables = build(&rows, &DeSelection::All).unwrap();
        assert_eq!(tables.cru_id(100), Some(3));
        assert_eq!(tables.warnings().len(), 1);
        assert_eq!(tables.warnings()[0].ignored_cru, 4);
        // Both CRUs still know their SOLARs
        assert!(tables.solar_ids(4).unwrap().contains(&2));
    }

    #[test]
    fn test_solar_count_ignores_order() {
        let mut rows = vec![
            row(0, 1, 0, 100, [10, 20, 0, 0, 0]),
            row(0, 1, 1, 100, [11, 21, 0, 0, 0]),
            row(1, 9, 0, 101, [12, 22, 0, 0, 0]),
            row(1, 17, 2, 102, [13, 23, 0, 0, 0]),
        ];
        let forward = build(&rows, &DeSelection::All).unwrap();
        rows.reverse();
        let backward = build(&rows, &DeSelection::All).unwrap();
        rows.swap(0, 2);
        let shuffled = build(&rows, &DeSelection::All).unwrap();
        assert_eq!(forward.solar_count(), 3);
        assert_eq!(backward.solar_count(), 3);
        assert_eq!(shuffled.solar_count(), 3);
    }

    #[test]
    fn test_selection() {
        let rows = vec![
            row(0, 1, 0, 100, [10, 20, 0, 0, 0]),
            row(1, 9, 0, 101, [12, 22, 0, 0, 0]),
        ];
        let tables = build(&rows, &DeSelection::Only(BTreeSet::from([101]))).unwrap();
        assert_eq!(tables.cru_id(100), None);
        assert_eq!(tables.cru_id(101), Some(1));
        assert_eq!(tables.solar_count(), 1);

        let empty = build(&rows, &DeSelection::Only(BTreeSet::new())).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.solar_count(), 0);
    }

    #[test]
    fn test_from_parts_rejects_duplicate_channels() {
        let channel = encode_channel(100, 10).unwrap();
        let parts = vec![
            (encode_address(1, 0, 0).unwrap(), channel),
            (encode_address(1, 0, 1).unwrap(), channel),
        ];
        assert!(ElecMapTables::from_parts(parts, BTreeMap::new(), BTreeMap::new(), 0).is_err());
    }
}
