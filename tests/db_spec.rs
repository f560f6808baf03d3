use chrono::Duration;
use notekeep::db::{Database, DbError};
use notekeep::models::*;
use speculate2::speculate;

fn create_user(db: &Database, email: &str) -> User {
    db.create_user(email, "Test User", "$argon2id$placeholder")
        .expect("Failed to create user")
}

fn create_category(db: &Database, user_id: i64, name: &str) -> Category {
    db.create_category(
        user_id,
        CreateCategoryInput {
            name: name.to_string(),
            theme: None,
        },
    )
    .expect("Failed to create category")
}

fn create_note(db: &Database, user_id: i64, title: &str, content: &str) -> NoteWithCategories {
    db.create_note(
        user_id,
        CreateNoteInput {
            title: title.to_string(),
            content: content.to_string(),
            category_ids: None,
            is_pinned: None,
        },
    )
    .expect("Failed to create note")
}

fn titles(page: &NotePage) -> Vec<&str> {
    page.notes.iter().map(|n| n.note.title.as_str()).collect()
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
        let user = create_user(&db, "owner@example.com");
    }

    describe "users" {
        it "stores emails lowercased" {
            let created = create_user(&db, "  Mixed@Example.COM ");
            assert_eq!(created.email, "mixed@example.com");

            let (found, hash) = db
                .find_credentials("MIXED@example.com")
                .expect("Query failed")
                .expect("User should exist");
            assert_eq!(found.id, created.id);
            assert_eq!(hash, "$argon2id$placeholder");
        }

        it "rejects a duplicate email" {
            let result = db.create_user("OWNER@example.com", "Other", "hash");
            assert!(matches!(result, Err(DbError::EmailTaken)));
        }

        it "returns None for an unknown user" {
            assert!(db.get_user(9999).expect("Query failed").is_none());
            assert!(db.find_credentials("nobody@example.com").expect("Query failed").is_none());
        }
    }

    describe "auth sessions" {
        it "resolves a live token to its user" {
            let session = db.create_auth_session(user.id, Duration::days(1)).expect("Failed to create session");
            assert_eq!(session.token.len(), 32);

            let found = db.find_session_user(&session.token).expect("Query failed");
            assert_eq!(found.map(|u| u.id), Some(user.id));
        }

        it "drops expired tokens" {
            let session = db.create_auth_session(user.id, Duration::seconds(-1)).expect("Failed to create session");

            assert!(db.find_session_user(&session.token).expect("Query failed").is_none());
            assert!(!db.delete_auth_session(&session.token).expect("Delete failed"));
        }

        it "deletes a token on logout" {
            let session = db.create_auth_session(user.id, Duration::days(1)).expect("Failed to create session");

            assert!(db.delete_auth_session(&session.token).expect("Delete failed"));
            assert!(db.find_session_user(&session.token).expect("Query failed").is_none());
        }

        it "purges only expired sessions" {
            db.create_auth_session(user.id, Duration::seconds(-5)).expect("Failed to create session");
            db.create_auth_session(user.id, Duration::seconds(-5)).expect("Failed to create session");
            let live = db.create_auth_session(user.id, Duration::days(1)).expect("Failed to create session");

            assert_eq!(db.purge_expired_sessions().expect("Purge failed"), 2);
            assert!(db.find_session_user(&live.token).expect("Query failed").is_some());
        }
    }

    describe "categories" {
        it "creates a category with the default theme" {
            let category = create_category(&db, user.id, "  Work ");
            assert_eq!(category.name, "Work");
            assert_eq!(category.theme, DEFAULT_THEME);
            assert_eq!(category.user_id, user.id);
        }

        it "rejects a duplicate name regardless of case" {
            create_category(&db, user.id, "Work");
            let result = db.create_category(user.id, CreateCategoryInput {
                name: "WORK".to_string(),
                theme: Some("red".to_string()),
            });
            assert!(matches!(result, Err(DbError::DuplicateCategory)));
        }

        it "allows the same name for different users" {
            let other = create_user(&db, "other@example.com");
            create_category(&db, user.id, "Work");
            create_category(&db, other.id, "Work");
        }

        it "lists categories by name with note counts" {
            let work = create_category(&db, user.id, "work");
            create_category(&db, user.id, "Errands");
            db.create_note(user.id, CreateNoteInput {
                title: "Standup".to_string(),
                content: String::new(),
                category_ids: Some(vec![work.id]),
                is_pinned: None,
            }).expect("Failed to create note");

            let categories = db.list_categories(user.id).expect("Query failed");
            let summary: Vec<(&str, u64)> = categories
                .iter()
                .map(|c| (c.category.name.as_str(), c.note_count))
                .collect();
            assert_eq!(summary, vec![("Errands", 0), ("work", 1)]);
        }

        it "hides categories from other users" {
            let other = create_user(&db, "other@example.com");
            let category = create_category(&db, user.id, "Private");

            assert!(db.get_category(other.id, category.id).expect("Query failed").is_none());
            assert!(db.list_categories(other.id).expect("Query failed").is_empty());
            assert!(!db.delete_category(other.id, category.id).expect("Delete failed"));
        }

        it "updates only the supplied fields" {
            let category = create_category(&db, user.id, "Ideas");
            let updated = db.update_category(user.id, category.id, UpdateCategoryInput {
                name: None,
                theme: Some("violet".to_string()),
            }).expect("Update failed").expect("Category should exist");

            assert_eq!(updated.name, "Ideas");
            assert_eq!(updated.theme, "violet");
        }

        it "keeps notes when a category is deleted" {
            let category = create_category(&db, user.id, "Temp");
            let note = db.create_note(user.id, CreateNoteInput {
                title: "Survivor".to_string(),
                content: String::new(),
                category_ids: Some(vec![category.id]),
                is_pinned: None,
            }).expect("Failed to create note");

            assert!(db.delete_category(user.id, category.id).expect("Delete failed"));

            let found = db.get_note_by_slug(user.id, &note.note.slug)
                .expect("Query failed")
                .expect("Note should survive");
            assert!(found.categories.is_empty());
        }
    }

    describe "create_note" {
        it "derives a timestamped slug from the title" {
            let note = create_note(&db, user.id, "Shopping List!", "<p>milk</p>");

            let (base, stamp) = note.note.slug.rsplit_once('-').expect("slug has a suffix");
            assert_eq!(base, "shopping-list");
            assert_eq!(stamp.len(), 14);
            assert!(stamp.chars().all(|c| c.is_ascii_digit()));
            assert!(!note.note.is_pinned);
        }

        it "gives notes with the same title distinct slugs" {
            let a = create_note(&db, user.id, "Same Title", "");
            let b = create_note(&db, user.id, "Same Title", "");

            assert_ne!(a.note.slug, b.note.slug);
            assert!(b.note.slug.starts_with("same-title-"));
        }

        it "sanitizes content before storing it" {
            let note = create_note(&db, user.id, "XSS", "<p>ok</p><script>alert('x')</script>");
            assert_eq!(note.note.content, "<p>ok</p>");

            let stored = db.get_note_by_slug(user.id, &note.note.slug)
                .expect("Query failed")
                .expect("Note should exist");
            assert_eq!(stored.note.content, "<p>ok</p>");
        }

        it "links categories ordered by name, ignoring repeats" {
            let zeta = create_category(&db, user.id, "Zeta");
            let alpha = create_category(&db, user.id, "Alpha");

            let note = db.create_note(user.id, CreateNoteInput {
                title: "Tagged".to_string(),
                content: String::new(),
                category_ids: Some(vec![zeta.id, alpha.id, zeta.id]),
                is_pinned: Some(true),
            }).expect("Failed to create note");

            let names: Vec<_> = note.categories.iter().map(|c| c.name.as_str()).collect();
            assert_eq!(names, vec!["Alpha", "Zeta"]);
            assert!(note.note.is_pinned);
        }

        it "writes nothing when a category belongs to someone else" {
            let other = create_user(&db, "other@example.com");
            let foreign = create_category(&db, other.id, "Theirs");

            let result = db.create_note(user.id, CreateNoteInput {
                title: "Sneaky".to_string(),
                content: String::new(),
                category_ids: Some(vec![foreign.id]),
                is_pinned: None,
            });

            match result {
                Err(DbError::UnknownCategories(ids)) => assert_eq!(ids, vec![foreign.id]),
                other => panic!("expected UnknownCategories, got {other:?}"),
            }
            let page = db.list_notes(user.id, &NoteListQuery::default()).expect("Query failed");
            assert_eq!(page.meta.total, 0);
        }
    }

    describe "list_notes" {
        it "returns an empty page when there are no notes" {
            let page = db.list_notes(user.id, &NoteListQuery::default()).expect("Query failed");
            assert!(page.notes.is_empty());
            assert_eq!(page.meta, PageMeta { total: 0, page: 1, limit: 10, total_pages: 0 });
        }

        it "excludes pinned notes and other users' notes" {
            let other = create_user(&db, "other@example.com");
            create_note(&db, user.id, "Visible", "");
            create_note(&db, other.id, "Foreign", "");
            let pinned = create_note(&db, user.id, "Pinned", "");
            db.toggle_pin(user.id, pinned.note.id).expect("Toggle failed");

            let page = db.list_notes(user.id, &NoteListQuery::default()).expect("Query failed");
            assert_eq!(titles(&page), vec!["Visible"]);
        }

        it "paginates with total and page count" {
            for i in 0..5 {
                create_note(&db, user.id, &format!("Note {i}"), "");
            }

            let query = NoteListQuery { page: 2, limit: 2, sort_by: SortBy::TitleAsc, ..Default::default() };
            let page = db.list_notes(user.id, &query).expect("Query failed");

            assert_eq!(titles(&page), vec!["Note 2", "Note 3"]);
            assert_eq!(page.meta, PageMeta { total: 5, page: 2, limit: 2, total_pages: 3 });
        }

        it "returns an empty page past the end" {
            create_note(&db, user.id, "Only", "");
            let query = NoteListQuery { page: 4, ..Default::default() };
            let page = db.list_notes(user.id, &query).expect("Query failed");

            assert!(page.notes.is_empty());
            assert_eq!(page.meta.total, 1);
            assert_eq!(page.meta.total_pages, 1);
        }

        it "sorts by title ignoring case" {
            create_note(&db, user.id, "banana", "");
            create_note(&db, user.id, "Cherry", "");
            create_note(&db, user.id, "apple", "");

            let asc = NoteListQuery { sort_by: SortBy::TitleAsc, ..Default::default() };
            let desc = NoteListQuery { sort_by: SortBy::TitleDesc, ..Default::default() };

            assert_eq!(titles(&db.list_notes(user.id, &asc).unwrap()), vec!["apple", "banana", "Cherry"]);
            assert_eq!(titles(&db.list_notes(user.id, &desc).unwrap()), vec!["Cherry", "banana", "apple"]);
        }

        it "sorts by most recent update by default" {
            let first = create_note(&db, user.id, "First", "");
            create_note(&db, user.id, "Second", "");
            db.update_note(user.id, &first.note.slug, UpdateNoteInput {
                content: Some("<p>edited</p>".to_string()),
                ..Default::default()
            }).expect("Update failed");

            let by_update = db.list_notes(user.id, &NoteListQuery::default()).unwrap();
            assert_eq!(titles(&by_update), vec!["First", "Second"]);

            let by_creation = NoteListQuery { sort_by: SortBy::CreatedAt, ..Default::default() };
            assert_eq!(titles(&db.list_notes(user.id, &by_creation).unwrap()), vec!["Second", "First"]);
        }

        it "searches title and content case-insensitively" {
            create_note(&db, user.id, "Groceries", "<p>Buy MILK</p>");
            create_note(&db, user.id, "Milkshake recipe", "");
            create_note(&db, user.id, "Taxes", "<p>forms</p>");

            let query = NoteListQuery { search: Some("milk".to_string()), sort_by: SortBy::TitleAsc, ..Default::default() };
            let page = db.list_notes(user.id, &query).expect("Query failed");
            assert_eq!(titles(&page), vec!["Groceries", "Milkshake recipe"]);
            assert_eq!(page.meta.total, 2);
        }

        it "treats LIKE wildcards in the search term literally" {
            create_note(&db, user.id, "50% off", "");
            create_note(&db, user.id, "500 items", "");

            let query = NoteListQuery { search: Some("50%".to_string()), ..Default::default() };
            let page = db.list_notes(user.id, &query).expect("Query failed");
            assert_eq!(titles(&page), vec!["50% off"]);
        }

        it "filters by an owned category" {
            let work = create_category(&db, user.id, "Work");
            db.create_note(user.id, CreateNoteInput {
                title: "Filed".to_string(),
                content: String::new(),
                category_ids: Some(vec![work.id]),
                is_pinned: None,
            }).expect("Failed to create note");
            create_note(&db, user.id, "Loose", "");

            let query = NoteListQuery { category: CategoryFilter::Only(work.id), ..Default::default() };
            let page = db.list_notes(user.id, &query).expect("Query failed");
            assert_eq!(titles(&page), vec!["Filed"]);
            assert_eq!(page.notes[0].categories[0].name, "Work");
        }

        it "returns nothing for a foreign or invalid category" {
            let other = create_user(&db, "other@example.com");
            let foreign = create_category(&db, other.id, "Theirs");
            create_note(&db, user.id, "Mine", "");

            for category in [CategoryFilter::Only(foreign.id), CategoryFilter::Invalid] {
                let query = NoteListQuery { page: 3, category, ..Default::default() };
                let page = db.list_notes(user.id, &query).expect("Query failed");
                assert!(page.notes.is_empty());
                assert_eq!(page.meta, PageMeta { total: 0, page: 3, limit: 10, total_pages: 0 });
            }
        }
    }

    describe "list_pinned_notes" {
        it "returns only pinned notes, optionally by category" {
            let work = create_category(&db, user.id, "Work");
            db.create_note(user.id, CreateNoteInput {
                title: "Pinned work".to_string(),
                content: String::new(),
                category_ids: Some(vec![work.id]),
                is_pinned: Some(true),
            }).expect("Failed to create note");
            db.create_note(user.id, CreateNoteInput {
                title: "Pinned other".to_string(),
                content: String::new(),
                category_ids: None,
                is_pinned: Some(true),
            }).expect("Failed to create note");
            create_note(&db, user.id, "Unpinned", "");

            let all = db.list_pinned_notes(user.id, CategoryFilter::Any).expect("Query failed");
            assert_eq!(all.len(), 2);
            assert!(all.iter().all(|n| n.note.is_pinned));

            let work_only = db.list_pinned_notes(user.id, CategoryFilter::Only(work.id)).expect("Query failed");
            assert_eq!(work_only.len(), 1);
            assert_eq!(work_only[0].note.title, "Pinned work");

            let invalid = db.list_pinned_notes(user.id, CategoryFilter::Invalid).expect("Query failed");
            assert!(invalid.is_empty());
        }
    }

    describe "update_note" {
        it "changes supplied fields and keeps the slug" {
            let note = create_note(&db, user.id, "Draft", "<p>v1</p>");
            let updated = db.update_note(user.id, &note.note.slug, UpdateNoteInput {
                title: Some("Final".to_string()),
                content: Some("<p onclick=\"x()\">v2</p>".to_string()),
                ..Default::default()
            }).expect("Update failed").expect("Note should exist");

            assert_eq!(updated.note.title, "Final");
            assert_eq!(updated.note.content, "<p>v2</p>");
            assert_eq!(updated.note.slug, note.note.slug);
            assert_eq!(updated.note.created_at, note.note.created_at);
            assert!(updated.note.updated_at > note.note.updated_at);
        }

        it "replaces categories when a list is supplied" {
            let a = create_category(&db, user.id, "A");
            let b = create_category(&db, user.id, "B");
            let note = db.create_note(user.id, CreateNoteInput {
                title: "Shuffle".to_string(),
                content: String::new(),
                category_ids: Some(vec![a.id]),
                is_pinned: None,
            }).expect("Failed to create note");

            let updated = db.update_note(user.id, &note.note.slug, UpdateNoteInput {
                category_ids: Some(vec![b.id]),
                ..Default::default()
            }).expect("Update failed").expect("Note should exist");
            assert_eq!(updated.categories.iter().map(|c| c.id).collect::<Vec<_>>(), vec![b.id]);

            let untouched = db.update_note(user.id, &note.note.slug, UpdateNoteInput {
                title: Some("Renamed".to_string()),
                ..Default::default()
            }).expect("Update failed").expect("Note should exist");
            assert_eq!(untouched.categories.len(), 1);

            let cleared = db.update_note(user.id, &note.note.slug, UpdateNoteInput {
                category_ids: Some(vec![]),
                ..Default::default()
            }).expect("Update failed").expect("Note should exist");
            assert!(cleared.categories.is_empty());
        }

        it "rolls back when a category is unknown" {
            let a = create_category(&db, user.id, "A");
            let note = db.create_note(user.id, CreateNoteInput {
                title: "Stable".to_string(),
                content: String::new(),
                category_ids: Some(vec![a.id]),
                is_pinned: None,
            }).expect("Failed to create note");

            let result = db.update_note(user.id, &note.note.slug, UpdateNoteInput {
                title: Some("Changed".to_string()),
                category_ids: Some(vec![a.id, 424242]),
                ..Default::default()
            });
            assert!(matches!(result, Err(DbError::UnknownCategories(ref ids)) if ids == &vec![424242]));

            let stored = db.get_note_by_slug(user.id, &note.note.slug)
                .expect("Query failed")
                .expect("Note should exist");
            assert_eq!(stored.note.title, "Stable");
            assert_eq!(stored.categories.len(), 1);
        }

        it "returns None for another user's note" {
            let other = create_user(&db, "other@example.com");
            let note = create_note(&db, user.id, "Mine", "");

            let result = db.update_note(other.id, &note.note.slug, UpdateNoteInput {
                title: Some("Hijacked".to_string()),
                ..Default::default()
            }).expect("Update failed");
            assert!(result.is_none());
        }
    }

    describe "delete_note" {
        it "deletes an owned note and its links" {
            let a = create_category(&db, user.id, "A");
            let note = db.create_note(user.id, CreateNoteInput {
                title: "Gone".to_string(),
                content: String::new(),
                category_ids: Some(vec![a.id]),
                is_pinned: None,
            }).expect("Failed to create note");

            assert!(db.delete_note(user.id, &note.note.slug).expect("Delete failed"));
            assert!(db.get_note_by_slug(user.id, &note.note.slug).expect("Query failed").is_none());
            assert_eq!(db.list_categories(user.id).expect("Query failed")[0].note_count, 0);
        }

        it "refuses to delete another user's note" {
            let other = create_user(&db, "other@example.com");
            let note = create_note(&db, user.id, "Mine", "");

            assert!(!db.delete_note(other.id, &note.note.slug).expect("Delete failed"));
            assert!(db.get_note_by_slug(user.id, &note.note.slug).expect("Query failed").is_some());
        }
    }

    describe "toggle_pin" {
        it "flips the pin back and forth without touching updated_at" {
            let note = create_note(&db, user.id, "Flip", "");

            let first = db.toggle_pin(user.id, note.note.id).expect("Toggle failed");
            assert_eq!(first, Some(PinToggle { is_pinned: true }));
            let second = db.toggle_pin(user.id, note.note.id).expect("Toggle failed");
            assert_eq!(second, Some(PinToggle { is_pinned: false }));

            let stored = db.get_note_by_slug(user.id, &note.note.slug)
                .expect("Query failed")
                .expect("Note should exist");
            assert_eq!(stored.note.updated_at, note.note.updated_at);
        }

        it "returns None for a missing or foreign note" {
            let other = create_user(&db, "other@example.com");
            let note = create_note(&db, user.id, "Mine", "");

            assert!(db.toggle_pin(other.id, note.note.id).expect("Toggle failed").is_none());
            assert!(db.toggle_pin(user.id, 9999).expect("Toggle failed").is_none());
        }
    }

    describe "open" {
        it "creates the database file and parent directories" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("nested").join("notes.db");

            let file_db = Database::open(path.clone()).expect("Failed to open database");
            file_db.migrate().expect("Failed to migrate");
            create_user(&file_db, "file@example.com");

            assert!(path.exists());
        }
    }
}
