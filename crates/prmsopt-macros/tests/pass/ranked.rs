use std::cmp::Ordering;

use prmsopt_macros::Columns;

#[derive(Debug, Clone, Copy, Columns)]
pub struct Fit {
    #[column(label = "NSE", rank = 1, order = "desc")]
    pub nse: f64,
    #[column(rank = 2)]
    pub rmse: f64,
    pub spread: f64,
}

fn main() {
    assert_eq!(Fit::column_labels(), &["NSE", "RMSE", "SPREAD"]);

    let good = Fit { nse: 0.9, rmse: 2.0, spread: 0.0 };
    let worse = Fit { nse: 0.5, rmse: 1.0, spread: 0.0 };
    assert_eq!(good.rank_cmp(&worse), Ordering::Less);

    let tied = Fit { nse: 0.9, rmse: 1.5, spread: 7.0 };
    assert_eq!(good.rank_cmp(&tied), Ordering::Greater);

    let missing = Fit { nse: f64::NAN, rmse: 0.0, spread: 0.0 };
    assert_eq!(missing.rank_cmp(&worse), Ordering::Greater);

    // unranked fields never decide
    let other = Fit { spread: -1.0, ..good };
    assert_eq!(good.rank_cmp(&other), Ordering::Equal);
    assert_eq!(other.values(), [0.9, 2.0, -1.0]);
}
