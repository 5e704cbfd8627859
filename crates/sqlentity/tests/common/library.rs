//! Authors, books and loans.

use sqlentity::prelude::*;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    Active,
    Retired,
}

pub static STATUSES: [Status; 2] = [Status::Active, Status::Retired];

#[derive(Debug, Default, Clone)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub status: Status,
    pub books: LazyCollection<Book>,
}

impl Entity for Author {
    fn descriptor() -> EntityDescriptor<Self> {
        EntityDescriptor::entity()
            .column(
                "id",
                ColumnDef::new().named("AuthorID").sql_type("BIGINT").key(),
                Accessor::new(|a: &Author| a.id, |a, v| a.id = v),
            )
            .column(
                "name",
                ColumnDef::new().named("Name").length(100).nullable(false),
                Accessor::new(|a: &Author| a.name.clone(), |a, v| a.name = v),
            )
            .column(
                "status",
                ColumnDef::new().named("Status").length(16),
                Accessor::converted(
                    EnumConverter::new(&STATUSES),
                    |a: &Author| a.status,
                    |a, v| a.status = v,
                ),
            )
            .relationship(
                "books",
                RelationshipDef::one_to_many().mapped_by("author"),
                Binding::collection(|a: &mut Author, c| a.books = c),
            )
    }
}

#[derive(Debug, Default, Clone)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author_id: Option<i64>,
    pub author: LazyReference<Author>,
}

impl Entity for Book {
    fn descriptor() -> EntityDescriptor<Self> {
        EntityDescriptor::entity()
            .column(
                "id",
                ColumnDef::new().named("BookID").sql_type("BIGINT").key(),
                Accessor::new(|b: &Book| b.id, |b, v| b.id = v),
            )
            .column(
                "title",
                ColumnDef::new().named("Title").length(200).nullable(false),
                Accessor::new(|b: &Book| b.title.clone(), |b, v| b.title = v),
            )
            .column(
                "author_id",
                ColumnDef::new().named("AuthorID").sql_type("BIGINT"),
                Accessor::new(|b: &Book| b.author_id, |b, v| b.author_id = v),
            )
            .relationship(
                "author",
                RelationshipDef::many_to_one("AuthorID"),
                Binding::lazy(|b: &mut Book, r| b.author = r),
            )
    }
}

#[derive(Debug, Default, Clone)]
pub struct Loan {
    pub id: i64,
    pub book_id: Option<i64>,
    pub book: LazyReference<Book>,
}

impl Entity for Loan {
    fn descriptor() -> EntityDescriptor<Self> {
        EntityDescriptor::entity()
            .column(
                "id",
                ColumnDef::new().named("LoanID").sql_type("BIGINT").key(),
                Accessor::new(|l: &Loan| l.id, |l, v| l.id = v),
            )
            .column(
                "book_id",
                ColumnDef::new().named("BookID").sql_type("BIGINT"),
                Accessor::new(|l: &Loan| l.book_id, |l, v| l.book_id = v),
            )
            .relationship(
                "book",
                RelationshipDef::many_to_one("BookID").eager(),
                Binding::lazy(|l: &mut Loan, r| l.book = r),
            )
    }
}

pub fn author(id: i64, name: &str) -> Author {
    Author {
        id,
        name: name.to_string(),
        ..Author::default()
    }
}

pub fn book(id: i64, title: &str, author_id: Option<i64>) -> Book {
    Book {
        id,
        title: title.to_string(),
        author_id,
        ..Book::default()
    }
}
