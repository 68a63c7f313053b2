use {
    darling::{
        ast::{Data, Fields},
        FromDeriveInput, FromField, FromVariant,
    },
    proc_macro2::{Span, TokenStream},
    quote::{format_ident, quote},
    syn::{parse_quote, Generics, Ident, Index, Member, Path, Type},
};

#[derive(FromDeriveInput)]
#[darling(attributes(graphwire), supports(struct_any, enum_any))]
pub(crate) struct SerializeArgs {
    pub(crate) ident: Ident,
    pub(crate) generics: Generics,
    pub(crate) data: Data<Variant, Field>,
    /// Type name announced on the wire instead of the identifier.
    #[darling(default)]
    pub(crate) rename: Option<String>,
    /// Path to the graphwire crate, for re-exports.
    #[darling(rename = "crate", default)]
    pub(crate) crate_path: Option<Path>,
}

#[derive(FromField)]
#[darling(attributes(graphwire))]
pub(crate) struct Field {
    pub(crate) ident: Option<Ident>,
    pub(crate) ty: Type,
    #[darling(default)]
    pub(crate) rename: Option<String>,
    /// Leave the field out of the wire format. On the way in it keeps its
    /// current value (or its default in a freshly built enum variant).
    #[darling(default)]
    pub(crate) skip: bool,
}

#[derive(FromVariant)]
#[darling(attributes(graphwire))]
pub(crate) struct Variant {
    pub(crate) ident: Ident,
    pub(crate) fields: Fields<Field>,
}

impl Field {
    /// `self.<member>` accessor for struct fields.
    pub(crate) fn member(&self, index: usize) -> Member {
        match &self.ident {
            Some(ident) => Member::Named(ident.clone()),
            None => Member::Unnamed(Index {
                index: index as u32,
                span: Span::call_site(),
            }),
        }
    }

    /// Local binding used when destructuring an enum variant.
    pub(crate) fn binding(&self, index: usize) -> Ident {
        match &self.ident {
            Some(ident) => format_ident!("__field_{}", unraw(ident)),
            None => format_ident!("__field_{index}"),
        }
    }

    /// Label written for the field.
    pub(crate) fn label(&self, index: usize) -> String {
        if let Some(rename) = &self.rename {
            return rename.clone();
        }
        match &self.ident {
            Some(ident) => unraw(ident),
            None => index.to_string(),
        }
    }
}

fn unraw(ident: &Ident) -> String {
    let name = ident.to_string();
    match name.strip_prefix("r#") {
        Some(stripped) => stripped.to_owned(),
        None => name,
    }
}

pub(crate) fn get_crate_name(args: &SerializeArgs) -> Path {
    args.crate_path
        .clone()
        .unwrap_or_else(|| parse_quote!(::graphwire))
}

/// Body of `Serialize::type_name`.
///
/// Generic types fall back to the full type name so that different
/// instantiations do not read each other's packages.
pub(crate) fn type_name(args: &SerializeArgs) -> TokenStream {
    if let Some(rename) = &args.rename {
        return quote!(#rename);
    }
    if args.generics.type_params().next().is_some() {
        return quote!(::core::any::type_name::<Self>());
    }
    let name = unraw(&args.ident);
    quote!(#name)
}

/// Add `bound` to every type parameter.
pub(crate) fn bounded_generics(generics: &Generics, bound: TokenStream) -> Generics {
    let mut generics = generics.clone();
    let params: Vec<Ident> = generics.type_params().map(|param| param.ident.clone()).collect();
    let where_clause = generics.make_where_clause();
    for param in params {
        where_clause.predicates.push(parse_quote!(#param: #bound));
    }
    generics
}
