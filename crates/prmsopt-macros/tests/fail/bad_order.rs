use prmsopt_macros::Columns;

#[derive(Columns)]
pub struct Fit {
    #[column(rank = 1, order = "up")]
    pub nse: f64,
}

fn main() {
    let row = Fit { nse: 0.5 };
    let _ = row.nse;
}
