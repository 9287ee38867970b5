pub mod moduli;
pub mod studenti;
