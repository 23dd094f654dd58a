//! Tests for status, history, cancel, remove, checksum and recover.

use super::parse;
use crate::cli::CliCommand;

#[test]
fn cli_parse_status_list() {
    match parse(&["pldl", "status"]) {
        CliCommand::Status { id, limit } => {
            assert!(id.is_none());
            assert_eq!(limit, 20);
        }
        _ => panic!("expected Status"),
    }
}

#[test]
fn cli_parse_status_one() {
    match parse(&["pldl", "status", "abc", "--limit", "5"]) {
        CliCommand::Status { id, limit } => {
            assert_eq!(id.as_deref(), Some("abc"));
            assert_eq!(limit, 5);
        }
        _ => panic!("expected Status with id"),
    }
}

#[test]
fn cli_parse_history() {
    match parse(&["pldl", "history", "--limit", "3"]) {
        CliCommand::History { limit } => assert_eq!(limit, 3),
        _ => panic!("expected History"),
    }
}

#[test]
fn cli_parse_cancel() {
    match parse(&["pldl", "cancel", "abc"]) {
        CliCommand::Cancel { id } => assert_eq!(id, "abc"),
        _ => panic!("expected Cancel"),
    }
}

#[test]
fn cli_parse_remove() {
    match parse(&["pldl", "remove", "abc"]) {
        CliCommand::Remove { id, delete_files } => {
            assert_eq!(id, "abc");
            assert!(!delete_files);
        }
        _ => panic!("expected Remove"),
    }
}

#[test]
fn cli_parse_remove_delete_files() {
    match parse(&["pldl", "remove", "abc", "--delete-files"]) {
        CliCommand::Remove { delete_files, .. } => assert!(delete_files),
        _ => panic!("expected Remove with --delete-files"),
    }
}

#[test]
fn cli_parse_checksum() {
    match parse(&["pldl", "checksum", "/tmp/mix.zip"]) {
        CliCommand::Checksum { path } => assert_eq!(path, "/tmp/mix.zip"),
        _ => panic!("expected Checksum"),
    }
}

#[test]
fn cli_parse_recover() {
    match parse(&["pldl", "recover"]) {
        CliCommand::Recover => {}
        _ => panic!("expected Recover"),
    }
}
