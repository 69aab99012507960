pub mod alphavantage;
pub mod csv_dir;
pub mod price_frame;
pub mod price_provider;
pub mod synthetic;
pub mod yahoo;
