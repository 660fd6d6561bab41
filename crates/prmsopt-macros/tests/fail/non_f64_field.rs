use prmsopt_macros::Columns;

#[derive(Columns)]
pub struct Mixed {
    pub nse: f64,
    pub rmse: f32,
}

fn main() {
    let row = Mixed { nse: 0.5, rmse: 1.0 };
    let _ = row.nse + f64::from(row.rmse);
}
