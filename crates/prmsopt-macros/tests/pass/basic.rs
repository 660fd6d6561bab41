use prmsopt_macros::Columns;

#[derive(Debug, Clone, Copy, Columns)]
pub struct TestScores {
    pub nse: f64,
    pub rmse: f64,
    pub pbias: f64,
}

fn main() {
    let row = TestScores { nse: 0.9, rmse: 1.0, pbias: -2.5 };
    let mut cols = TestScoresColumns::with_capacity(10);
    cols.push(&row);
    assert_eq!(cols.len(), 1);
    assert!(!cols.is_empty());
    assert_eq!(cols.column("rmse"), Some(&[1.0][..]));
    assert_eq!(cols.column("kge"), None);
    assert_eq!(TestScores::field_names(), &["nse", "rmse", "pbias"]);
    assert_eq!(TestScores::column_labels(), &["NSE", "RMSE", "PBIAS"]);
    assert_eq!(row.values(), [0.9, 1.0, -2.5]);
}
