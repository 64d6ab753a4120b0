//! Call-volume forecast for a run, computed before the run is authorized.

use crate::errors::AppError;
use crate::grid::Grid;
use crate::models::SearchScope;

/// Predicted upstream calls: one search per point, plus one detail lookup per
/// point when enrichment follows.
pub fn estimate_api_calls(points: usize, with_details: bool) -> usize {
    points * (1 + usize::from(with_details))
}

/// Number of search points a run over `scope` will query.
///
/// One per named area; the grid size for a grid-sampled territory; a single
/// text query for the territory otherwise.
pub fn planned_points(scope: &SearchScope, grid: Option<&Grid>) -> usize {
    match scope {
        SearchScope::Territory => grid.map_or(1, Grid::len),
        SearchScope::Regions(areas) | SearchScope::Departments(areas) => areas.len(),
    }
}

/// Caller-side gate against the operator ceiling.
pub fn ensure_within_budget(estimated: usize, ceiling: usize) -> Result<(), AppError> {
    if estimated > ceiling {
        tracing::warn!(
            "Run refused: {} estimated calls above ceiling {}",
            estimated,
            ceiling
        );
        return Err(AppError::BudgetExceeded { estimated, ceiling });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate() {
        assert_eq!(estimate_api_calls(100, true), 200);
        assert_eq!(estimate_api_calls(100, false), 100);
        assert_eq!(estimate_api_calls(0, true), 0);
    }

    #[test]
    fn test_france_grid_estimate() {
        let grid = Grid::france();
        let points = planned_points(&SearchScope::Territory, Some(&grid));
        assert_eq!(estimate_api_calls(points, true), 968);
    }

    #[test]
    fn test_scoped_points() {
        let scope = SearchScope::Departments(vec!["13".into(), "69".into(), "75".into()]);
        assert_eq!(planned_points(&scope, Some(&Grid::france())), 3);
        assert_eq!(planned_points(&SearchScope::Territory, None), 1);
    }

    #[test]
    fn test_gate() {
        assert!(ensure_within_budget(200, 200).is_ok());
        match ensure_within_budget(201, 200) {
            Err(AppError::BudgetExceeded { estimated, ceiling }) => {
                assert_eq!((estimated, ceiling), (201, 200));
            }
            other => panic!("Expected BudgetExceeded, got {:?}", other),
        }
    }
}
