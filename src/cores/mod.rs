pub mod bytescan;
