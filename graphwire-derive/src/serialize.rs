use {
    crate::common::{bounded_generics, get_crate_name, type_name, Field, SerializeArgs, Variant},
    darling::{
        ast::{Data, Fields, Style},
        FromDeriveInput, Result,
    },
    proc_macro2::TokenStream,
    quote::quote,
    syn::{DeriveInput, Path},
};

/// Label of the variant tag in a data-carrying enum.
const TAG_LABEL: &str = "tag";

fn impl_struct(crate_name: &Path, fields: &Fields<Field>) -> TokenStream {
    let members = fields
        .iter()
        .enumerate()
        .filter(|(_, field)| !field.skip)
        .map(|(i, field)| {
            let member = field.member(i);
            let label = field.label(i);
            quote! {
                #crate_name::Serialize::serialize(&mut self.#member, channel, #label)?;
            }
        });

    quote! {
        #crate_name::schema::serialize_class(
            channel,
            <Self as #crate_name::Serialize>::type_name(),
            label,
            |channel| {
                #(#members)*
                Ok(())
            },
        )
    }
}

fn destructure(variant: &Variant) -> TokenStream {
    let ident = &variant.ident;
    let bindings = variant
        .fields
        .iter()
        .enumerate()
        .map(|(i, field)| field.binding(i));
    match variant.fields.style {
        Style::Struct => {
            let names = variant.fields.iter().map(|field| &field.ident);
            quote!(Self::#ident { #(#names: #bindings),* })
        }
        Style::Tuple => quote!(Self::#ident(#(#bindings),*)),
        Style::Unit => quote!(Self::#ident),
    }
}

fn default_variant(variant: &Variant) -> TokenStream {
    let ident = &variant.ident;
    let defaults = variant
        .fields
        .iter()
        .map(|_| quote!(::core::default::Default::default()));
    match variant.fields.style {
        Style::Struct => {
            let names = variant.fields.iter().map(|field| &field.ident);
            quote!(Self::#ident { #(#names: #defaults),* })
        }
        Style::Tuple => quote!(Self::#ident(#(#defaults),*)),
        Style::Unit => quote!(Self::#ident),
    }
}

/// Enums without fields travel as a bare `i32` tag, the variant's position.
fn impl_unit_enum(crate_name: &Path, variants: &[Variant]) -> TokenStream {
    let tags = variants.iter().enumerate().map(|(i, variant)| {
        let ident = &variant.ident;
        let tag = i as i32;
        quote!(Self::#ident => #tag)
    });
    let rebuild = variants.iter().enumerate().map(|(i, variant)| {
        let ident = &variant.ident;
        let tag = i as i32;
        quote!(#tag => Self::#ident)
    });

    quote! {
        let mut tag: i32 = match *self {
            #(#tags,)*
        };
        #crate_name::schema::serialize_primitives(channel, ::core::slice::from_mut(&mut tag), label)?;
        *self = match tag {
            #(#rebuild,)*
            _ => return Err(#crate_name::error::invalid_tag_encoding(i64::from(tag))),
        };
        Ok(())
    }
}

/// Enums with fields are framed: the `tag`, then the variant's fields.
///
/// Reading a tag for a different variant than the current one replaces the
/// value with that variant built from defaults before its fields are read.
fn impl_data_enum(crate_name: &Path, variants: &[Variant]) -> TokenStream {
    let tags = variants.iter().enumerate().map(|(i, variant)| {
        let ident = &variant.ident;
        let tag = i as i32;
        quote!(Self::#ident { .. } => #tag)
    });
    let rebuild = variants.iter().enumerate().map(|(i, variant)| {
        let ident = &variant.ident;
        let tag = i as i32;
        let fresh = default_variant(variant);
        quote! {
            #tag => if !::core::matches!(self, Self::#ident { .. }) {
                *self = #fresh;
            }
        }
    });
    let bodies = variants.iter().map(|variant| {
        let pattern = destructure(variant);
        let members = variant
            .fields
            .iter()
            .enumerate()
            .map(|(i, field)| {
                let binding = field.binding(i);
                if field.skip {
                    return quote!(let _ = #binding;);
                }
                let label = field.label(i);
                quote!(#crate_name::Serialize::serialize(#binding, channel, #label)?;)
            });
        quote!(#pattern => { #(#members)* })
    });

    quote! {
        #crate_name::schema::serialize_class(
            channel,
            <Self as #crate_name::Serialize>::type_name(),
            label,
            |channel| {
                let mut tag: i32 = match self {
                    #(#tags,)*
                };
                #crate_name::Serialize::serialize(&mut tag, channel, #TAG_LABEL)?;
                match tag {
                    #(#rebuild)*
                    _ => return Err(#crate_name::error::invalid_tag_encoding(i64::from(tag))),
                }
                match self {
                    #(#bodies)*
                }
                Ok(())
            },
        )
    }
}

pub(crate) fn generate(input: DeriveInput) -> Result<TokenStream> {
    let args = SerializeArgs::from_derive_input(&input)?;
    let crate_name = get_crate_name(&args);
    let ident = &args.ident;
    let type_name = type_name(&args);

    let (category, body, bound) = match &args.data {
        Data::Struct(fields) => (
            quote!(Composite),
            impl_struct(&crate_name, fields),
            quote!(#crate_name::Serialize),
        ),
        Data::Enum(variants) if variants.iter().all(|v| v.fields.is_empty()) => (
            quote!(Primitive),
            impl_unit_enum(&crate_name, variants),
            quote!(#crate_name::Serialize),
        ),
        Data::Enum(variants) => (
            quote!(Composite),
            impl_data_enum(&crate_name, variants),
            quote!(#crate_name::Serialize + ::core::default::Default),
        ),
    };

    let generics = bounded_generics(&args.generics, bound);
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics #crate_name::Serialize for #ident #ty_generics #where_clause {
            const CATEGORY: #crate_name::Category = #crate_name::Category::#category;

            #[inline]
            fn type_name() -> &'static str {
                #type_name
            }

            fn serialize<__C: #crate_name::channel::Channel + ?::core::marker::Sized>(
                &mut self,
                channel: &mut __C,
                label: &str,
            ) -> #crate_name::Result<()> {
                #body
            }
        }
    })
}
