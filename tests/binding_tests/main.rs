//! Binding surface tests
