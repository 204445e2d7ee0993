//! Integration tests for group flows: create, join, scoped chat, removal.

mod common;

use common::TestServer;

#[tokio::test]
async fn test_group_chat_stays_in_the_group() {
    let server = TestServer::spawn(17651).await.expect("Failed to spawn test server");

    let mut alice = server.connect("alice").await.expect("Failed to connect alice");
    alice.register().await.expect("Alice registration failed");
    alice.send("/create g1").await.expect("send failed");
    alice.expect_line("Group 'g1' created successfully.").await.expect("No create reply");
    alice.join("g1").await.expect("Alice join failed");

    let mut bob = server.connect("bob").await.expect("Failed to connect bob");
    bob.register().await.expect("Bob registration failed");
    bob.join("g1").await.expect("Bob join failed");

    let mut carol = server.connect("carol").await.expect("Failed to connect carol");
    carol.register().await.expect("Carol registration failed");
    carol.drain().await;

    alice.send("hello group").await.expect("send failed");
    bob.expect_line("GROUP [g1] | alice: hello group").await.expect("No group delivery");

    // Carol is global-only; the first relayed line she sees must be the
    // global marker sent after the group message, never the group message.
    alice.send("/leave g1").await.expect("send failed");
    alice.expect_line("You left group 'g1'.").await.expect("No leave reply");
    alice.send("everyone here").await.expect("send failed");
    let line = carol.recv().await.expect("No global delivery");
    assert_eq!(line, "GLOBAL | alice: everyone here");
}

#[tokio::test]
async fn test_join_switches_groups_atomically() {
    let server = TestServer::spawn(17652).await.expect("Failed to spawn test server");

    let mut alice = server.connect("alice").await.expect("Failed to connect alice");
    alice.register().await.expect("Alice registration failed");
    alice.send("/create g1").await.expect("send failed");
    alice.send("/create g2").await.expect("send failed");
    alice.join("g1").await.expect("Alice join failed");

    let mut bob = server.connect("bob").await.expect("Failed to connect bob");
    bob.register().await.expect("Bob registration failed");
    bob.join("g1").await.expect("Bob join failed");
    bob.drain().await;

    // Joining g2 implicitly leaves g1; the old group is told.
    alice.join("g2").await.expect("Alice switch failed");
    bob.expect_line("GROUP [g1] | Server: User alice left group 'g1'.")
        .await
        .expect("No implicit-leave announcement");

    alice.send("/list").await.expect("send failed");
    alice.expect_line("- g1 (1 members)").await.expect("No g1 listing");
    alice.expect_line("- g2 (1 members)").await.expect("No g2 listing");
}

#[tokio::test]
async fn test_remove_evicts_all_members() {
    let server = TestServer::spawn(17653).await.expect("Failed to spawn test server");

    let mut alice = server.connect("alice").await.expect("Failed to connect alice");
    alice.register().await.expect("Alice registration failed");
    alice.send("/create doomed").await.expect("send failed");
    alice.join("doomed").await.expect("Alice join failed");

    let mut bob = server.connect("bob").await.expect("Failed to connect bob");
    bob.register().await.expect("Bob registration failed");
    bob.join("doomed").await.expect("Bob join failed");

    alice.send("/remove doomed").await.expect("send failed");
    let notice = "GROUP [doomed] | Server: Group 'doomed' has been removed by alice.";
    alice.expect_line(notice).await.expect("No removal notice to alice");
    bob.expect_line(notice).await.expect("No removal notice to bob");

    // Every former member is back in global scope.
    bob.send("where are we").await.expect("send failed");
    alice.expect_line("GLOBAL | bob: where are we").await.expect("No global delivery");
}

#[tokio::test]
async fn test_emptied_group_is_auto_deleted() {
    let server = TestServer::spawn(17654).await.expect("Failed to spawn test server");

    let mut alice = server.connect("alice").await.expect("Failed to connect alice");
    alice.register().await.expect("Registration failed");
    alice.send("/create g1").await.expect("send failed");
    alice.join("g1").await.expect("join failed");

    alice.send("/leave g1").await.expect("send failed");
    alice
        .expect_line("You left group 'g1'. Group was removed as it is now empty.")
        .await
        .expect("No auto-delete reply");

    alice.send("/list").await.expect("send failed");
    alice.expect_line("No groups available.").await.expect("Group still listed");
}

#[tokio::test]
async fn test_join_requires_an_existing_group() {
    let server = TestServer::spawn(17655).await.expect("Failed to spawn test server");

    let mut alice = server.connect("alice").await.expect("Failed to connect alice");
    alice.register().await.expect("Registration failed");

    alice.send("/join ghost").await.expect("send failed");
    alice.expect_line("Group 'ghost' does not exist.").await.expect("No not-found reply");

    alice.send("/create g1").await.expect("send failed");
    alice.join("g1").await.expect("join failed");
    alice.send("/join g1").await.expect("send failed");
    alice.expect_line("You are already in group 'g1'.").await.expect("No already-member reply");
}
