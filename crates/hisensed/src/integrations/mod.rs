pub mod hisense;
