mod chunk_tests;
mod html_tests;
