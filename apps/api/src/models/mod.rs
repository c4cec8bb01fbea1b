pub mod rejected;
