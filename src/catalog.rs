//! Book catalog and copy pool
//!
//! Books and their copies live in separate tables; the book's
//! `available_copies` counter is adjusted in the same write transaction as
//! the copy it describes.

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase};

use crate::database::{
    group_key, load, load_all, load_group, new_id, store, TABLE_BOOKS, TABLE_COPIES,
};
use crate::error::{LibraryError, LibraryResult};
use crate::model::{Book, BookCopy, BookFilter, CreateBookRequest, EditBookRequest, PLACEHOLDER_COVER};

fn required(field: &str, value: &str) -> LibraryResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LibraryError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn book_not_found(book_id: &str) -> LibraryError {
    LibraryError::NotFound(format!("Book with id {} not found", book_id))
}

/// Adds a title to the catalog with no copies.
///
/// Fails with `Validation` when title or author is blank and `Conflict` when
/// the same title/author pair is already catalogued.
pub fn create_book(db: &Database, payload: CreateBookRequest, now: DateTime<Utc>) -> LibraryResult<Book> {
    let title = required("Title", &payload.title)?;
    let author = required("Author", &payload.author)?;

    let book = Book {
        id: new_id(),
        title,
        author,
        available_copies: 0,
        deleted: false,
        cover_image: payload
            .cover_image
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| PLACEHOLDER_COVER.to_string()),
        pdf: payload.pdf.filter(|url| !url.trim().is_empty()),
        created_at: now,
    };

    let write_txn = db.begin_write()?;
    {
        let mut books = write_txn.open_table(TABLE_BOOKS)?;
        let existing: Vec<Book> = load_all(&books)?;
        if existing
            .iter()
            .any(|b| b.title == book.title && b.author == book.author)
        {
            return Err(LibraryError::Conflict("Book already exists".to_string()));
        }
        store(&mut books, &book.id, &book)?;
    }
    write_txn.commit()?;

    tracing::info!(book_id = %book.id, title = %book.title, "book added to catalog");
    Ok(book)
}

/// Registers a new free copy and bumps the book's counter.
pub fn add_copy(db: &Database, book_id: &str, now: DateTime<Utc>) -> LibraryResult<BookCopy> {
    let write_txn = db.begin_write()?;
    let copy = {
        let mut books = write_txn.open_table(TABLE_BOOKS)?;
        let mut book: Book = load(&books, book_id)?.ok_or_else(|| book_not_found(book_id))?;

        let copy = BookCopy {
            id: new_id(),
            book_id: book.id.clone(),
            is_issued: false,
            created_at: now,
        };
        let mut copies = write_txn.open_table(TABLE_COPIES)?;
        store(&mut copies, &group_key(&book.id, &copy.id), &copy)?;

        book.available_copies += 1;
        store(&mut books, &book.id, &book)?;
        copy
    };
    write_txn.commit()?;

    tracing::info!(book_id, copy_id = %copy.id, "book copy added");
    Ok(copy)
}

pub fn edit_book(db: &Database, book_id: &str, payload: EditBookRequest) -> LibraryResult<Book> {
    let title = required("Title", &payload.title)?;
    let author = required("Author", &payload.author)?;

    let write_txn = db.begin_write()?;
    let book = {
        let mut books = write_txn.open_table(TABLE_BOOKS)?;
        let mut book: Book = load(&books, book_id)?.ok_or_else(|| book_not_found(book_id))?;
        book.title = title;
        book.author = author;
        store(&mut books, &book.id, &book)?;
        book
    };
    write_txn.commit()?;

    Ok(book)
}

/// Soft delete: the record and its copies stay, regular users stop seeing it.
pub fn delete_book(db: &Database, book_id: &str) -> LibraryResult<()> {
    let write_txn = db.begin_write()?;
    {
        let mut books = write_txn.open_table(TABLE_BOOKS)?;
        let mut book: Book = load(&books, book_id)?.ok_or_else(|| book_not_found(book_id))?;
        book.deleted = true;
        store(&mut books, &book.id, &book)?;
    }
    write_txn.commit()?;

    tracing::info!(book_id, "book soft-deleted");
    Ok(())
}

pub fn get_book(db: &Database, book_id: &str) -> LibraryResult<Book> {
    let read_txn = db.begin_read()?;
    let books = read_txn.open_table(TABLE_BOOKS)?;
    load(&books, book_id)?.ok_or_else(|| book_not_found(book_id))
}

/// Lists books matching `filter`. Deleted books are only returned when
/// `include_deleted` is set (staff views).
pub fn list_books(db: &Database, filter: &BookFilter, include_deleted: bool) -> LibraryResult<Vec<Book>> {
    let read_txn = db.begin_read()?;
    let books = read_txn.open_table(TABLE_BOOKS)?;
    let all: Vec<Book> = load_all(&books)?;

    let search = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    let author = filter
        .author
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    let limit = filter.limit.filter(|l| *l > 0).unwrap_or(usize::MAX);

    let mut matched: Vec<Book> = all
        .into_iter()
        .filter(|b| include_deleted || !b.deleted)
        .filter(|b| {
            search
                .as_ref()
                .map_or(true, |s| b.title.to_lowercase().contains(s))
        })
        .filter(|b| {
            author
                .as_ref()
                .map_or(true, |a| b.author.to_lowercase().contains(a))
        })
        .collect();
    matched.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    matched.truncate(limit);
    Ok(matched)
}

pub fn list_copies(db: &Database, book_id: &str) -> LibraryResult<Vec<BookCopy>> {
    let read_txn = db.begin_read()?;
    let copies = read_txn.open_table(TABLE_COPIES)?;
    load_group(&copies, book_id)
}

/// Number of copies of `book_id` not currently issued
pub fn free_copy_count(db: &Database, book_id: &str) -> LibraryResult<usize> {
    let free = list_copies(db, book_id)?
        .iter()
        .filter(|c| !c.is_issued)
        .count();
    Ok(free)
}
