use prmsopt_macros::Columns;

#[derive(Debug, Clone, Copy, Columns)]
#[columns(name = "FitTable")]
pub struct Fit {
    pub nse: f64,
    pub r_squared: f64,
}

fn main() {
    let row = Fit { nse: 0.5, r_squared: 0.7 };
    let mut table = FitTable::with_capacity(5);
    table.push(&row);
    table.push(&row);
    assert_eq!(table.len(), 2);
    assert_eq!(table.nse, vec![0.5, 0.5]);
    assert_eq!(Fit::field_names(), &["nse", "r_squared"]);
}
