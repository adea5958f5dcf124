mod helpers;
mod vm_tests;
