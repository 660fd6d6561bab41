use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, Data, DeriveInput, Expr, Fields, Lit, Meta, Token};

/// Derive a score table for a struct of `f64` measures.
///
/// Generates a `{Name}Columns` struct (or the name given by
/// `#[columns(name = "..")]`) with one `Vec<f64>` per field, and on the source
/// struct:
///
/// - `field_names()` and `column_labels()` in declaration order
/// - `values()`, the measures as an array in the same order
/// - `rank_cmp(&other)`, best first over the fields marked with `rank`
///
/// Field attributes:
///
/// ```ignore
/// #[column(label = "NSE", rank = 1, order = "desc")]
/// ```
///
/// `label` defaults to the upper-cased field name. Fields with a `rank` are
/// compared by ascending rank number; `order` is `"asc"` (default) or
/// `"desc"`. NaN always sorts after any number.
#[proc_macro_derive(Columns, attributes(columns, column))]
pub fn derive_columns(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct ColumnField<'a> {
    ident: &'a syn::Ident,
    label: String,
    rank: Option<(u32, bool)>,
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let columns_name = table_name(input)?.unwrap_or_else(|| format_ident!("{}Columns", name));

    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Columns can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Columns can only be derived for structs",
            ))
        }
    };
    if named.is_empty() {
        return Err(syn::Error::new_spanned(
            name,
            "Columns struct must have at least one field",
        ));
    }

    let mut fields = Vec::with_capacity(named.len());
    for field in named {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        if !is_f64_type(&field.ty) {
            return Err(syn::Error::new_spanned(
                &field.ty,
                "Columns derive: all fields must be f64",
            ));
        }
        fields.push(column_field(ident, &field.attrs)?);
    }

    let idents: Vec<&syn::Ident> = fields.iter().map(|f| f.ident).collect();
    let names: Vec<String> = idents.iter().map(|i| i.to_string()).collect();
    let labels: Vec<&str> = fields.iter().map(|f| f.label.as_str()).collect();
    let first = idents[0];
    let n = idents.len();

    let mut ranked: Vec<&ColumnField> = fields.iter().filter(|f| f.rank.is_some()).collect();
    ranked.sort_by_key(|f| f.rank.map(|(r, _)| r));
    let rank_steps = ranked.iter().map(|f| {
        let ident = f.ident;
        let descending = f.rank.is_some_and(|(_, desc)| desc);
        let ord = if descending {
            quote! { b.partial_cmp(&a) }
        } else {
            quote! { a.partial_cmp(&b) }
        };
        quote! {
            .then_with(|| {
                let (a, b) = (self.#ident, other.#ident);
                match (a.is_nan(), b.is_nan()) {
                    (true, true) => ::std::cmp::Ordering::Equal,
                    (true, false) => ::std::cmp::Ordering::Greater,
                    (false, true) => ::std::cmp::Ordering::Less,
                    (false, false) => #ord.unwrap_or(::std::cmp::Ordering::Equal),
                }
            })
        }
    });

    let column_arms = idents.iter().zip(&names).map(|(f, s)| quote! { #s => Some(&self.#f) });

    Ok(quote! {
        /// Columnar score table, one vector per measure.
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct #columns_name {
            #(pub #idents: Vec<f64>,)*
        }

        impl #columns_name {
            pub fn with_capacity(n: usize) -> Self {
                Self {
                    #(#idents: Vec::with_capacity(n),)*
                }
            }

            /// Append one row.
            pub fn push(&mut self, row: &#name) {
                #(self.#idents.push(row.#idents);)*
            }

            pub fn len(&self) -> usize {
                self.#first.len()
            }

            pub fn is_empty(&self) -> bool {
                self.#first.is_empty()
            }

            /// Look up a column by field name.
            pub fn column(&self, name: &str) -> Option<&[f64]> {
                match name {
                    #(#column_arms,)*
                    _ => None,
                }
            }
        }

        impl #name {
            pub fn field_names() -> &'static [&'static str] {
                &[#(#names),*]
            }

            /// Display names, e.g. for table headers.
            pub fn column_labels() -> &'static [&'static str] {
                &[#(#labels),*]
            }

            pub fn values(&self) -> [f64; #n] {
                [#(self.#idents),*]
            }

            /// Order two rows best first.
            #[allow(unused_variables)]
            pub fn rank_cmp(&self, other: &Self) -> ::std::cmp::Ordering {
                ::std::cmp::Ordering::Equal #(#rank_steps)*
            }
        }
    })
}

fn table_name(input: &DeriveInput) -> syn::Result<Option<proc_macro2::Ident>> {
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("columns")) {
        for meta in attr.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)? {
            match &meta {
                Meta::NameValue(nv) if nv.path.is_ident("name") => {
                    return Ok(Some(format_ident!("{}", lit_str(&nv.value)?)));
                }
                _ => return Err(syn::Error::new_spanned(meta, "expected `name = \"..\"`")),
            }
        }
    }
    Ok(None)
}

fn column_field<'a>(
    ident: &'a syn::Ident,
    attrs: &[syn::Attribute],
) -> syn::Result<ColumnField<'a>> {
    let mut label = None;
    let mut rank = None;
    let mut descending = false;
    for attr in attrs.iter().filter(|a| a.path().is_ident("column")) {
        for meta in attr.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)? {
            let Meta::NameValue(nv) = &meta else {
                return Err(syn::Error::new_spanned(meta, "expected `key = value`"));
            };
            if nv.path.is_ident("label") {
                label = Some(lit_str(&nv.value)?);
            } else if nv.path.is_ident("rank") {
                rank = Some(lit_int(&nv.value)?);
            } else if nv.path.is_ident("order") {
                descending = match lit_str(&nv.value)?.as_str() {
                    "asc" => false,
                    "desc" => true,
                    _ => {
                        return Err(syn::Error::new_spanned(
                            &nv.value,
                            "order must be \"asc\" or \"desc\"",
                        ))
                    }
                };
            } else {
                return Err(syn::Error::new_spanned(
                    &nv.path,
                    "unknown column attribute; expected label, rank or order",
                ));
            }
        }
    }
    Ok(ColumnField {
        ident,
        label: label.unwrap_or_else(|| ident.to_string().to_uppercase()),
        rank: rank.map(|r| (r, descending)),
    })
}

fn lit_str(expr: &Expr) -> syn::Result<String> {
    match expr {
        Expr::Lit(e) => match &e.lit {
            Lit::Str(s) => Ok(s.value()),
            _ => Err(syn::Error::new_spanned(expr, "expected a string literal")),
        },
        _ => Err(syn::Error::new_spanned(expr, "expected a string literal")),
    }
}

fn lit_int(expr: &Expr) -> syn::Result<u32> {
    match expr {
        Expr::Lit(e) => match &e.lit {
            Lit::Int(i) => i.base10_parse(),
            _ => Err(syn::Error::new_spanned(expr, "expected an integer literal")),
        },
        _ => Err(syn::Error::new_spanned(expr, "expected an integer literal")),
    }
}

fn is_f64_type(ty: &syn::Type) -> bool {
    if let syn::Type::Path(type_path) = ty {
        type_path.path.is_ident("f64")
    } else {
        false
    }
}
