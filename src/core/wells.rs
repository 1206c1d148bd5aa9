use crate::domain::model::{TransferMode, WellSpec};
use crate::utils::error::{PlanError, Result};

/// Source and destination wells in canonical order, ready for pairing.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedWells<L> {
    pub sources: Vec<L>,
    pub dests: Vec<L>,
    pub mode: TransferMode,
}

impl<L> ResolvedWells<L> {
    /// Number of individual transfers, i.e. how many volumes the request needs.
    pub fn transfer_count(&self) -> usize {
        self.sources.len().max(self.dests.len())
    }
}

/// Normalises both well specs and decides the transfer pattern.
///
/// Single-channel pipettes visit every well, so groups are flattened in
/// order. Multi-channel pipettes address a whole group (column) through its
/// first well, so each group collapses to its head.
pub fn resolve_wells<L>(
    sources: WellSpec<L>,
    dests: WellSpec<L>,
    channels: usize,
    mode: Option<TransferMode>,
) -> Result<ResolvedWells<L>> {
    if channels <= 1 {
        check_group_shapes(&sources, &dests)?;
    }

    let sources = flatten(sources, channels, "source")?;
    let dests = flatten(dests, channels, "destination")?;
    let mode = classify(sources.len(), dests.len(), mode)?;

    tracing::debug!(
        "Resolved {} source and {} destination wells as {}",
        sources.len(),
        dests.len(),
        mode
    );

    Ok(ResolvedWells {
        sources,
        dests,
        mode,
    })
}

/// Picks (or checks) the pattern from resolved cardinalities.
pub fn classify(sources: usize, dests: usize, requested: Option<TransferMode>) -> Result<TransferMode> {
    let fits = |mode: TransferMode| match mode {
        TransferMode::Transfer => sources == dests,
        TransferMode::Distribute => sources == 1,
        TransferMode::Consolidate => dests == 1,
    };

    let mode = match requested {
        Some(mode) => mode,
        None if sources == dests => TransferMode::Transfer,
        None if sources == 1 => TransferMode::Distribute,
        None if dests == 1 => TransferMode::Consolidate,
        None => TransferMode::Transfer,
    };

    if fits(mode) {
        Ok(mode)
    } else {
        Err(PlanError::IncompatibleWells {
            sources,
            dests,
            mode: mode.to_string(),
        })
    }
}

// Groups on both sides are consumed in lock-step, so paired groups must match.
fn check_group_shapes<L>(sources: &WellSpec<L>, dests: &WellSpec<L>) -> Result<()> {
    if let (WellSpec::Groups(src), WellSpec::Groups(dst)) = (sources, dests) {
        if src.len() == dst.len() {
            for (group, (s, d)) in src.iter().zip(dst).enumerate() {
                if s.len() != d.len() {
                    return Err(PlanError::RaggedGroups {
                        group,
                        source_len: s.len(),
                        dest_len: d.len(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn flatten<L>(spec: WellSpec<L>, channels: usize, side: &str) -> Result<Vec<L>> {
    let wells: Vec<L> = match spec {
        WellSpec::Single(well) => vec![well],
        WellSpec::List(wells) => wells,
        WellSpec::Groups(groups) if channels > 1 => {
            let mut heads = Vec::with_capacity(groups.len());
            for group in groups {
                match group.into_iter().next() {
                    Some(head) => heads.push(head),
                    None => return Err(empty(side)),
                }
            }
            heads
        }
        WellSpec::Groups(groups) => groups.into_iter().flatten().collect(),
    };

    if wells.is_empty() {
        return Err(empty(side));
    }
    Ok(wells)
}

fn empty(side: &str) -> PlanError {
    PlanError::EmptyWellSet {
        side: side.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(c: usize) -> Vec<String> {
        "ABCDEFGH".chars().map(|r| format!("{}{}", r, c)).collect()
    }

    #[test]
    fn test_equal_lengths_pair_one_to_one() {
        let resolved =
            resolve_wells(WellSpec::List(column(1)), WellSpec::List(column(2)), 1, None).unwrap();
        assert_eq!(resolved.mode, TransferMode::Transfer);
        assert_eq!(resolved.sources[3], "D1");
        assert_eq!(resolved.dests[3], "D2");
        assert_eq!(resolved.transfer_count(), 8);
    }

    #[test]
    fn test_single_source_distributes() {
        let resolved = resolve_wells(
            WellSpec::Single("A1".to_string()),
            WellSpec::List(column(2)),
            1,
            None,
        )
        .unwrap();
        assert_eq!(resolved.mode, TransferMode::Distribute);
        assert_eq!(resolved.transfer_count(), 8);
    }

    #[test]
    fn test_single_dest_consolidates() {
        let resolved = resolve_wells(
            WellSpec::Groups(vec![column(1), column(2)]),
            WellSpec::Single("A12".to_string()),
            1,
            None,
        )
        .unwrap();
        assert_eq!(resolved.mode, TransferMode::Consolidate);
        assert_eq!(resolved.sources.len(), 16);
        assert_eq!(resolved.sources[8], "A2");
    }

    #[test]
    fn test_many_to_many_mismatch_is_rejected() {
        let err = resolve_wells(
            WellSpec::List(column(1)[..3].to_vec()),
            WellSpec::List(column(2)[..5].to_vec()),
            1,
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PlanError::IncompatibleWells {
                sources: 3,
                dests: 5,
                ..
            }
        ));
    }

    #[test]
    fn test_ragged_groups_are_rejected() {
        let err = resolve_wells(
            WellSpec::Groups(vec![column(1), column(2)]),
            WellSpec::Groups(vec![column(3), column(4)[..4].to_vec()]),
            1,
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PlanError::RaggedGroups {
                group: 1,
                source_len: 8,
                dest_len: 4
            }
        ));
    }

    #[test]
    fn test_multichannel_uses_group_heads() {
        let resolved = resolve_wells(
            WellSpec::Groups(vec![column(1), column(2), column(3)]),
            WellSpec::Groups(vec![column(4), column(5), column(6)]),
            8,
            None,
        )
        .unwrap();
        assert_eq!(resolved.sources, vec!["A1", "A2", "A3"]);
        assert_eq!(resolved.dests, vec!["A4", "A5", "A6"]);
    }

    #[test]
    fn test_empty_wells_are_rejected() {
        let err = resolve_wells(
            WellSpec::List(Vec::<String>::new()),
            WellSpec::Single("A1".to_string()),
            1,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::EmptyWellSet { .. }));
    }

    #[test]
    fn test_forced_mode_is_checked() {
        assert_eq!(
            classify(1, 1, Some(TransferMode::Distribute)).unwrap(),
            TransferMode::Distribute
        );
        assert!(classify(2, 3, Some(TransferMode::Distribute)).is_err());
        assert!(classify(4, 1, Some(TransferMode::Transfer)).is_err());
        assert_eq!(classify(1, 1, None).unwrap(), TransferMode::Transfer);
    }
}
